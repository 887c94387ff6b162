//! Bounded work queue between the scanner and the workers.
//!
//! Completion is signalled by closing, not by emptiness: `recv` returns
//! `None` only once the single sender is gone *and* every queued document
//! has been handed out. A momentarily empty queue never stops a worker.

use flume::{Receiver, Sender};

use crate::document::Document;

/// Creates a queue holding at most `capacity` documents.
pub fn bounded(capacity: usize) -> (DocumentSender, DocumentReceiver) {
    let (tx, rx) = flume::bounded(capacity.max(1));
    (DocumentSender { tx }, DocumentReceiver { rx })
}

/// Producer half. Not `Clone`: there is exactly one scanner.
#[derive(Debug)]
pub struct DocumentSender {
    tx: Sender<Document>,
}

impl DocumentSender {
    /// Waits for a free slot, then enqueues `doc`.
    ///
    /// Returns the document back if every receiver has been dropped.
    pub async fn send(&self, doc: Document) -> Result<(), Document> {
        self.tx.send_async(doc).await.map_err(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }
}

/// Consumer half, shared by all workers.
#[derive(Clone, Debug)]
pub struct DocumentReceiver {
    rx: Receiver<Document>,
}

impl DocumentReceiver {
    /// Next document, or `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<Document> {
        self.rx.recv_async().await.ok()
    }

    /// Removes everything currently queued and returns how many documents
    /// were discarded.
    pub fn drain(&self) -> usize {
        self.rx.drain().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::time::Duration;

    fn doc(id: &str) -> Document {
        Document::new(id, Map::new())
    }

    #[tokio::test]
    async fn recv_ends_only_after_close_and_drain() {
        let (tx, rx) = bounded(4);
        tx.send(doc("a")).await.unwrap();
        tx.send(doc("b")).await.unwrap();
        drop(tx);

        assert_eq!(rx.recv().await.map(|d| d.id), Some("a".to_string()));
        assert_eq!(rx.recv().await.map(|d| d.id), Some("b".to_string()));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn empty_open_queue_keeps_worker_waiting() {
        let (tx, rx) = bounded(1);
        let waiting = tokio::time::timeout(Duration::from_millis(30), rx.recv()).await;
        assert!(waiting.is_err(), "recv must block while the sender is alive");

        tx.send(doc("late")).await.unwrap();
        assert_eq!(rx.recv().await.map(|d| d.id), Some("late".to_string()));
    }

    #[tokio::test]
    async fn send_blocks_when_full() {
        let (tx, rx) = bounded(2);
        tx.send(doc("1")).await.unwrap();
        tx.send(doc("2")).await.unwrap();
        assert_eq!(tx.len(), 2);
        assert_eq!(tx.capacity(), Some(2));

        let blocked = tokio::time::timeout(Duration::from_millis(30), tx.send(doc("3"))).await;
        assert!(blocked.is_err(), "third send must wait for a free slot");

        rx.recv().await.unwrap();
        tx.send(doc("3")).await.unwrap();
        assert_eq!(rx.len(), 2);
    }

    #[tokio::test]
    async fn drain_counts_leftovers() {
        let (tx, rx) = bounded(8);
        for i in 0..5 {
            tx.send(doc(&i.to_string())).await.unwrap();
        }
        assert_eq!(rx.drain(), 5);
        assert!(rx.is_empty());
    }
}
