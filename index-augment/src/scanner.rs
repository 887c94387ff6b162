//! Document scanner: the single producer feeding the work queue.
//!
//! Besides the queue, the scanner holds at most one scroll page; the pipeline
//! caps the page at the queue capacity (`PipelineConfig::scan_request`).

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::document::Document;
use crate::errors::ScanError;
use crate::progress::Progress;
use crate::queue::DocumentSender;
use crate::stats::PipelineStats;
use crate::store::{RemoteStore, ScanRequest};

/// Pull-based cursor over every document of a collection.
///
/// Pages are fetched on demand, so at most one page is buffered. Call
/// [`DocumentScan::close`] to release the scroll context early.
pub struct DocumentScan<'a> {
    store: &'a dyn RemoteStore,
    request: ScanRequest,
    cursor: Option<String>,
    buffer: VecDeque<Document>,
    exhausted: bool,
}

impl<'a> DocumentScan<'a> {
    pub fn new(store: &'a dyn RemoteStore, request: ScanRequest) -> Self {
        Self {
            store,
            request,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Next document, `None` once the scroll is exhausted.
    ///
    /// After an error the scan is over; further calls return `None`.
    pub async fn next(&mut self) -> Option<Result<Document, ScanError>> {
        loop {
            if let Some(doc) = self.buffer.pop_front() {
                if doc.id.is_empty() {
                    self.exhausted = true;
                    self.buffer.clear();
                    return Some(Err(ScanError::MalformedHit(format!(
                        "empty _id in '{}'",
                        self.request.collection
                    ))));
                }
                return Some(Ok(doc));
            }
            if self.exhausted {
                return None;
            }

            let page = match self
                .store
                .scan_page(&self.request, self.cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e.into()));
                }
            };

            if page.cursor.is_some() {
                self.cursor = page.cursor;
            }
            if page.documents.is_empty() {
                self.exhausted = true;
            } else {
                debug!(page = page.documents.len(), "scroll page");
                self.buffer.extend(page.documents);
                // Without a cursor there is no next page to ask for.
                self.exhausted = self.cursor.is_none();
            }
        }
    }

    /// Releases the scroll context. Best-effort: failures are logged.
    pub async fn close(&mut self) {
        self.buffer.clear();
        self.exhausted = true;
        if let Some(cursor) = self.cursor.take() {
            if let Err(e) = self.store.clear_scan(&cursor).await {
                warn!(error = %e, "failed to clear scroll context");
            }
        }
    }
}

/// Lazy stream over every document of `request.collection`.
///
/// The scroll is released when the stream ends or fails.
pub fn scan<'a>(
    store: &'a dyn RemoteStore,
    request: ScanRequest,
) -> impl Stream<Item = Result<Document, ScanError>> + 'a {
    stream::unfold(Some(DocumentScan::new(store, request)), |state| async move {
        let mut scan = state?;
        match scan.next().await {
            Some(Ok(doc)) => Some((Ok(doc), Some(scan))),
            Some(Err(e)) => {
                scan.close().await;
                Some((Err(e), None))
            }
            None => {
                scan.close().await;
                None
            }
        }
    })
}

/// Scans the collection and enqueues every document.
///
/// Enqueueing waits for a free slot; that wait is the only backpressure.
/// Dropping `tx` on return closes the queue. Cancellation stops enqueueing
/// and is not an error. Returns the number of documents enqueued.
#[instrument(skip_all, fields(collection = %request.collection, page_size = request.page_size))]
pub async fn run_scanner(
    store: Arc<dyn RemoteStore>,
    request: ScanRequest,
    tx: DocumentSender,
    stats: Arc<PipelineStats>,
    progress: Arc<dyn Progress>,
    cancel: CancellationToken,
) -> Result<usize, ScanError> {
    match store.count(&request.collection).await {
        Ok(total) => progress.set_total(total),
        Err(e) => debug!(error = %e, "document count unavailable"),
    }

    let mut scan = DocumentScan::new(store.as_ref(), request);
    let mut enqueued = 0usize;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            next = scan.next() => next,
        };
        let doc = match next {
            None => break Ok(()),
            Some(Err(e)) => break Err(e),
            Some(Ok(doc)) => doc,
        };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            sent = tx.send(doc) => sent,
        };
        if let Err(doc) = sent {
            warn!(id = %doc.id, "queue has no consumers left; stopping scan");
            break Ok(());
        }

        enqueued += 1;
        stats.record_scanned();
        progress.inc();
    };

    scan.close().await;
    drop(tx);

    match &outcome {
        Ok(()) if cancel.is_cancelled() => {
            progress.finish("scan cancelled");
            info!(enqueued, "scan stopped by cancellation");
        }
        Ok(()) => {
            progress.finish("scan complete");
            info!(enqueued, "scan complete");
        }
        Err(e) => {
            progress.finish("scan failed");
            warn!(enqueued, error = %e, "scan failed");
        }
    }

    outcome.map(|()| enqueued)
}
