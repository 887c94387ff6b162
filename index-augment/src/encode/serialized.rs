//! Call-slot limiter for encoders that cannot serve concurrent requests.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use crate::document::Embedding;
use crate::encode::Encoder;
use crate::errors::EncodeError;

/// Wraps an encoder so that at most `slots` calls run at once.
///
/// With one slot every inference is serialized. Waiting callers only park on
/// the semaphore; queue and stats bookkeeping keep running.
pub struct SerializedEncoder<E> {
    inner: E,
    slots: Arc<Semaphore>,
}

impl<E: Encoder> SerializedEncoder<E> {
    pub fn new(inner: E, slots: usize) -> Self {
        Self {
            inner,
            slots: Arc::new(Semaphore::new(slots.max(1))),
        }
    }
}

impl<E: Encoder> Encoder for SerializedEncoder<E> {
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>> {
        Box::pin(async move {
            let _permit = self
                .slots
                .acquire()
                .await
                .map_err(|_| EncodeError::Provider("encoder slots closed".into()))?;
            self.inner.encode(text).await
        })
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records the highest number of overlapping calls.
    struct Probe {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Encoder for Probe {
        fn encode<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>> {
            Box::pin(async move {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![0.0; 2])
            })
        }

        fn dim(&self) -> usize {
            2
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_slot_serializes_calls() {
        let enc = Arc::new(SerializedEncoder::new(
            Probe {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            },
            1,
        ));

        let handles = (0..8)
            .map(|_| {
                let enc = Arc::clone(&enc);
                tokio::spawn(async move { enc.encode("t").await })
            })
            .collect::<Vec<_>>();
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }

        assert_eq!(enc.inner.peak.load(Ordering::SeqCst), 1);
        assert_eq!(enc.dim(), 2);
    }
}
