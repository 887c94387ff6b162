//! Augmentation worker.
//!
//! The indexing logic lives in a plain capability object ([`Indexer`]); the
//! spawned task ([`run_worker`]) only schedules: dequeue, build the payload,
//! write or buffer, repeat until the queue is closed and drained.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::document::{Document, Embedding, FieldSpec, UpdatePayload};
use crate::encode::Encoder;
use crate::errors::{EncodeError, StoreError, UpdateError};
use crate::extract::extract;
use crate::queue::DocumentReceiver;
use crate::retry::RetryPolicy;
use crate::stats::PipelineStats;
use crate::store::{BulkItem, RemoteStore};

/// Per-document operations, independent of scheduling.
pub trait Indexer: Send + Sync {
    /// Text to encode for `field`, if any.
    fn extract(&self, doc: &Document, field: &FieldSpec) -> Option<String>;

    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>>;

    /// Partial update of one document, retried per policy.
    fn write<'a>(
        &'a self,
        id: &'a str,
        payload: &'a UpdatePayload,
    ) -> BoxFuture<'a, Result<(), UpdateError>>;

    /// Partial updates of several documents. Returns the items that failed
    /// for good; an empty vector means every item was applied.
    fn write_batch(&self, items: Vec<BulkItem>) -> BoxFuture<'_, Vec<UpdateError>>;
}

/// [`Indexer`] over a remote store and an encoder.
pub struct SemanticIndexer {
    store: Arc<dyn RemoteStore>,
    encoder: Arc<dyn Encoder>,
    collection: String,
    retry: RetryPolicy,
}

impl SemanticIndexer {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        encoder: Arc<dyn Encoder>,
        collection: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            encoder,
            collection: collection.into(),
            retry,
        }
    }

    async fn write_one(&self, id: &str, payload: &UpdatePayload) -> Result<(), UpdateError> {
        self.retry
            .run(id, move || self.store.update(&self.collection, id, payload))
            .await
            .map_err(|(source, attempts)| classify(id, source, attempts))
    }

    async fn write_many(&self, items: Vec<BulkItem>) -> Vec<UpdateError> {
        let mut pending = items;
        let mut failed = Vec::new();
        let mut attempt = 1u32;

        while !pending.is_empty() {
            let mut retry_next = Vec::new();
            let mut last_errors = Vec::new();

            let response = self.store.bulk_update(&self.collection, &pending).await;
            match response {
                Ok(results) => {
                    let mut results = results.into_iter();
                    for item in pending {
                        let outcome = results.next().unwrap_or_else(|| {
                            Err(StoreError::Decode(format!("no bulk result for '{}'", item.id)))
                        });
                        match outcome {
                            Ok(()) => {}
                            Err(e) if e.is_retryable() => {
                                retry_next.push(item);
                                last_errors.push(e);
                            }
                            Err(e) => failed.push(UpdateError::Rejected { id: item.id, source: e }),
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    debug!(items = pending.len(), error = %e, "bulk request failed");
                    last_errors = pending.iter().map(|_| clone_status(&e)).collect();
                    retry_next = pending;
                }
                Err(e) => {
                    warn!(items = pending.len(), error = %e, "bulk request rejected");
                    failed.extend(pending.into_iter().map(|item| UpdateError::Rejected {
                        id: item.id,
                        source: clone_status(&e),
                    }));
                    return failed;
                }
            }

            if retry_next.is_empty() {
                break;
            }
            if attempt >= self.retry.max_attempts {
                failed.extend(retry_next.into_iter().zip(last_errors).map(|(item, source)| {
                    UpdateError::Exhausted {
                        id: item.id,
                        attempts: attempt,
                        source,
                    }
                }));
                break;
            }

            let wait = self.retry.delay_for(attempt);
            debug!(items = retry_next.len(), attempt, ?wait, "retrying bulk items");
            tokio::time::sleep(wait).await;
            attempt += 1;
            pending = retry_next;
        }

        failed
    }
}

/// Retryable errors that ran out of attempts are `Exhausted`; anything else
/// was rejected outright.
fn classify(id: &str, source: StoreError, attempts: u32) -> UpdateError {
    if source.is_retryable() {
        UpdateError::Exhausted {
            id: id.to_string(),
            attempts,
            source,
        }
    } else {
        UpdateError::Rejected {
            id: id.to_string(),
            source,
        }
    }
}

/// Per-item copy of a whole-request failure.
fn clone_status(e: &StoreError) -> StoreError {
    match e {
        StoreError::HttpStatus {
            status,
            url,
            snippet,
        } => StoreError::HttpStatus {
            status: *status,
            url: url.clone(),
            snippet: snippet.clone(),
        },
        other => StoreError::Decode(other.to_string()),
    }
}

impl Indexer for SemanticIndexer {
    fn extract(&self, doc: &Document, field: &FieldSpec) -> Option<String> {
        extract(doc, field)
    }

    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>> {
        self.encoder.encode(text)
    }

    fn write<'a>(
        &'a self,
        id: &'a str,
        payload: &'a UpdatePayload,
    ) -> BoxFuture<'a, Result<(), UpdateError>> {
        Box::pin(self.write_one(id, payload))
    }

    fn write_batch(&self, items: Vec<BulkItem>) -> BoxFuture<'_, Vec<UpdateError>> {
        Box::pin(self.write_many(items))
    }
}

/// Builds the partial update for `doc`.
///
/// Fields without text are left out silently; fields whose encoding fails are
/// left out, logged and counted. Other fields are unaffected either way.
pub async fn build_payload(
    indexer: &dyn Indexer,
    doc: &Document,
    fields: &[FieldSpec],
    stats: &PipelineStats,
) -> UpdatePayload {
    let mut payload = UpdatePayload::new();
    for field in fields {
        let Some(text) = indexer.extract(doc, field) else {
            trace!(id = %doc.id, field = field.name(), "nothing to encode");
            continue;
        };
        let encoded = indexer.encode(&text).await;
        match encoded {
            Ok(vector) => payload.insert_encoded(field, vector, text),
            Err(e) => {
                stats.record_encode_failure();
                warn!(id = %doc.id, field = field.name(), error = %e, "encoding failed; field skipped");
            }
        }
    }
    payload
}

/// Scheduling parameters shared by every worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub indexer: Arc<dyn Indexer>,
    pub fields: Arc<[FieldSpec]>,
    /// Payloads per write; 1 = one update request per document.
    pub batch_size: usize,
    pub stats: Arc<PipelineStats>,
    pub cancel: CancellationToken,
}

/// Worker loop. Ends when the queue is closed and drained, or on cancellation.
///
/// On cancellation the document in hand and any buffered payloads are still
/// written; nothing new is dequeued. Returns the number of documents handled.
#[instrument(skip_all, fields(worker = worker_id))]
pub async fn run_worker(worker_id: usize, rx: DocumentReceiver, ctx: WorkerContext) -> usize {
    let batch_size = ctx.batch_size.max(1);
    let mut batch: Vec<BulkItem> = Vec::with_capacity(batch_size);
    let mut handled = 0usize;

    loop {
        let doc = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            doc = rx.recv() => match doc {
                Some(doc) => doc,
                None => break,
            },
        };
        handled += 1;

        let payload = build_payload(ctx.indexer.as_ref(), &doc, &ctx.fields, &ctx.stats).await;
        if payload.is_empty() {
            ctx.stats.record_skipped();
            continue;
        }

        if batch_size == 1 {
            match ctx.indexer.write(&doc.id, &payload).await {
                Ok(()) => ctx.stats.record_updated(),
                Err(e) => {
                    warn!(id = e.id(), error = %e, "update failed");
                    ctx.stats.record_failed(e.id());
                }
            }
        } else {
            batch.push(BulkItem {
                id: doc.id,
                payload,
            });
            if batch.len() >= batch_size {
                flush(&ctx, &mut batch).await;
            }
        }
    }

    flush(&ctx, &mut batch).await;
    info!(handled, "worker finished");
    handled
}

async fn flush(ctx: &WorkerContext, batch: &mut Vec<BulkItem>) {
    if batch.is_empty() {
        return;
    }
    let items = std::mem::take(batch);
    let total = items.len();
    let failures = ctx.indexer.write_batch(items).await;

    for _ in 0..total.saturating_sub(failures.len()) {
        ctx.stats.record_updated();
    }
    for e in &failures {
        warn!(id = e.id(), error = %e, "update failed");
        ctx.stats.record_failed(e.id());
    }
    debug!(total, failed = failures.len(), "batch flushed");
}
