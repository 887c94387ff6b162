//! Run counters shared by the scanner and workers, and the final report.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters. Shared behind an `Arc`; all updates are lock-free except
/// the failed-id list.
#[derive(Debug, Default)]
pub struct PipelineStats {
    scanned: AtomicUsize,
    updated: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    encode_failures: AtomicUsize,
    abandoned: AtomicUsize,
    failed_ids: Mutex<Vec<String>>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document was handed to the queue.
    pub fn record_scanned(&self) {
        self.scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// A partial update was accepted.
    pub fn record_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    /// A document needed no write (nothing to encode, or every field failed).
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// A write failed after retries.
    pub fn record_failed(&self, id: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.failed_ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(id.to_string());
    }

    /// One field of one document could not be encoded.
    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Documents left unprocessed in the queue after cancellation.
    pub fn record_abandoned(&self, n: usize) {
        self.abandoned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn scanned(&self) -> usize {
        self.scanned.load(Ordering::Relaxed)
    }

    /// Consistent-enough copy for reporting. Call after all tasks joined for exact numbers.
    pub fn snapshot(&self, cancelled: bool, duration_ms: u128) -> PipelineReport {
        let mut failed_ids = self
            .failed_ids
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        failed_ids.sort();

        PipelineReport {
            scanned: self.scanned(),
            updated: self.updated.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            failed_ids,
            cancelled,
            duration_ms,
        }
    }
}

/// Summary of one augmentation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Documents enqueued by the scanner.
    pub scanned: usize,
    /// Documents that received a partial update.
    pub updated: usize,
    /// Documents that needed no write.
    pub skipped: usize,
    /// Documents whose write failed after retries.
    pub failed: usize,
    /// Individual field encodings that failed (the field was left out).
    pub encode_failures: usize,
    /// Documents drained from the queue unprocessed after cancellation.
    pub abandoned: usize,
    /// Ids of `failed` documents, sorted.
    pub failed_ids: Vec<String>,
    pub cancelled: bool,
    pub duration_ms: u128,
}

impl PipelineReport {
    /// Every scanned document was accounted for.
    pub fn is_balanced(&self) -> bool {
        self.scanned == self.updated + self.skipped + self.failed + self.abandoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let s = PipelineStats::new();
        for _ in 0..4 {
            s.record_scanned();
        }
        s.record_updated();
        s.record_skipped();
        s.record_failed("b");
        s.record_failed("a");
        s.record_encode_failure();

        let r = s.snapshot(false, 12);
        assert_eq!(r.scanned, 4);
        assert_eq!(r.updated, 1);
        assert_eq!(r.skipped, 1);
        assert_eq!(r.failed, 2);
        assert_eq!(r.encode_failures, 1);
        assert_eq!(r.failed_ids, vec!["a".to_string(), "b".to_string()]);
        assert!(r.is_balanced());
    }

    #[test]
    fn report_serializes_flat() {
        let r = PipelineReport {
            scanned: 1,
            updated: 1,
            ..Default::default()
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["updated"], 1);
        assert_eq!(v["cancelled"], false);
        assert!(v["failed_ids"].as_array().unwrap().is_empty());
    }
}
