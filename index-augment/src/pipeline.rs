//! Pipeline coordinator: schema first, then one scanner and N workers over a
//! bounded queue.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::encode::{Encoder, SerializedEncoder};
use crate::errors::{AugmentError, AugmentResult};
use crate::mapping::extend_schema;
use crate::progress::{self, Progress};
use crate::queue;
use crate::scanner::run_scanner;
use crate::stats::{PipelineReport, PipelineStats};
use crate::store::RemoteStore;
use crate::worker::{Indexer, SemanticIndexer, WorkerContext, run_worker};

/// One configured augmentation run.
///
/// The scanner and the workers talk to the store through separate clients;
/// pass the same `Arc` twice when that does not matter (tests, dry runs).
pub struct Pipeline {
    cfg: PipelineConfig,
    scan_store: Arc<dyn RemoteStore>,
    write_store: Arc<dyn RemoteStore>,
    encoder: Arc<dyn Encoder>,
    progress: Arc<dyn Progress>,
}

impl Pipeline {
    /// Wraps `encoder` in a [`SerializedEncoder`] when
    /// `cfg.encoder_max_in_flight > 0`.
    pub fn new(
        cfg: PipelineConfig,
        scan_store: Arc<dyn RemoteStore>,
        write_store: Arc<dyn RemoteStore>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        let encoder: Arc<dyn Encoder> = match cfg.encoder_max_in_flight {
            0 => encoder,
            slots => Arc::new(SerializedEncoder::new(encoder, slots)),
        };
        let progress = progress::for_terminal(cfg.show_progress);
        Self {
            cfg,
            scan_store,
            write_store,
            encoder,
            progress,
        }
    }

    /// Replaces the default progress reporter.
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Runs to completion.
    pub async fn run(&self) -> AugmentResult<PipelineReport> {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Runs until the collection is exhausted or `cancel` fires.
    ///
    /// On cancellation the scanner stops, every worker finishes the document
    /// it holds (and its buffered writes), and whatever is still queued is
    /// reported as `abandoned`.
    ///
    /// # Errors
    /// - [`AugmentError::Config`] for invalid settings or an encoder whose
    ///   dimensionality differs from `dim`
    /// - [`AugmentError::Schema`] when the mapping cannot be extended; no
    ///   document is touched
    /// - [`AugmentError::Scan`] when the scroll fails; workers stop after
    ///   their current document
    /// - [`AugmentError::Task`] when a spawned task panics; a failed worker
    ///   also stops the scanner, so the run ends instead of waiting on a queue
    ///   nobody drains
    pub async fn run_with_cancel(&self, cancel: CancellationToken) -> AugmentResult<PipelineReport> {
        let cfg = &self.cfg;
        cfg.validate()?;
        if self.encoder.dim() != cfg.dim {
            return Err(AugmentError::Config(format!(
                "encoder produces {} dims, mapping wants {}",
                self.encoder.dim(),
                cfg.dim
            )));
        }

        let started = Instant::now();
        info!(
            collection = %cfg.collection,
            fields = cfg.fields.len(),
            dim = cfg.dim,
            workers = cfg.workers,
            queue_capacity = cfg.queue_capacity,
            batch_size = cfg.batch_size,
            "augmentation: start"
        );

        let schema =
            extend_schema(self.write_store.as_ref(), &cfg.collection, &cfg.fields, cfg.dim).await?;
        info!(
            added = schema.added.len(),
            present = schema.already_present.len(),
            "schema ready"
        );

        let stats = Arc::new(PipelineStats::new());
        let (tx, rx) = queue::bounded(cfg.queue_capacity);
        let scan_cancel = cancel.child_token();
        let workers_cancel = cancel.child_token();

        let mut scanner = tokio::spawn(run_scanner(
            Arc::clone(&self.scan_store),
            cfg.scan_request(),
            tx,
            Arc::clone(&stats),
            Arc::clone(&self.progress),
            scan_cancel.clone(),
        ));

        let indexer: Arc<dyn Indexer> = Arc::new(SemanticIndexer::new(
            Arc::clone(&self.write_store),
            Arc::clone(&self.encoder),
            cfg.collection.clone(),
            cfg.retry,
        ));
        let ctx = WorkerContext {
            indexer,
            fields: Arc::from(cfg.fields.clone()),
            batch_size: cfg.batch_size,
            stats: Arc::clone(&stats),
            cancel: workers_cancel.clone(),
        };
        let mut workers = JoinSet::new();
        for id in 0..cfg.workers {
            workers.spawn(run_worker(id, rx.clone(), ctx.clone()));
        }
        drop(ctx);

        // Scanner and workers are joined together: the coordinator's own
        // receiver keeps the queue open, so a dead worker pool must stop the
        // scanner explicitly.
        let mut scan_outcome: Option<AugmentResult<usize>> = None;
        let mut worker_failure: Option<AugmentError> = None;
        while scan_outcome.is_none() || !workers.is_empty() {
            tokio::select! {
                joined = &mut scanner, if scan_outcome.is_none() => {
                    scan_outcome = Some(match joined {
                        Ok(Ok(enqueued)) => Ok(enqueued),
                        Ok(Err(e)) => {
                            error!(error = %e, "scan failed; stopping workers");
                            workers_cancel.cancel();
                            Err(AugmentError::Scan(e))
                        }
                        Err(join) => {
                            error!(error = %join, "scanner task failed; stopping workers");
                            workers_cancel.cancel();
                            Err(AugmentError::Task(format!("scanner: {join}")))
                        }
                    });
                }
                Some(joined) = workers.join_next() => {
                    if let Err(join) = joined {
                        error!(error = %join, "worker task failed; stopping the run");
                        scan_cancel.cancel();
                        workers_cancel.cancel();
                        worker_failure
                            .get_or_insert_with(|| AugmentError::Task(format!("worker: {join}")));
                    }
                }
            }
        }

        let leftover = rx.drain();
        if leftover > 0 {
            warn!(abandoned = leftover, "documents left unprocessed");
            stats.record_abandoned(leftover);
        }
        drop(rx);

        let report = stats.snapshot(cancel.is_cancelled(), started.elapsed().as_millis());
        info!(
            scanned = report.scanned,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            encode_failures = report.encode_failures,
            abandoned = report.abandoned,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "augmentation: finished"
        );

        if let Some(Err(e)) = scan_outcome {
            return Err(e);
        }
        if let Some(e) = worker_failure {
            return Err(e);
        }
        Ok(report)
    }
}
