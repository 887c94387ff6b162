//! Encoders for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use crate::document::Embedding;
use crate::encode::Encoder;
use crate::errors::EncodeError;

/// Deterministic encoder: `[len, 1, 0, ...]`. Texts containing `FAIL` error out.
pub struct FakeEncoder {
    pub dim: usize,
    pub calls: AtomicUsize,
}

impl FakeEncoder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn fake_vector(text: &str, dim: usize) -> Embedding {
    let mut v = vec![0.0; dim];
    if let Some(first) = v.first_mut() {
        *first = text.len() as f32;
    }
    if let Some(second) = v.get_mut(1) {
        *second = 1.0;
    }
    v
}

impl Encoder for FakeEncoder {
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = if text.contains("FAIL") {
            Err(EncodeError::Provider(format!("cannot encode '{text}'")))
        } else {
            Ok(fake_vector(text, self.dim))
        };
        Box::pin(futures::future::ready(out))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Encoder that blocks every call until the test hands out permits.
pub struct GatedEncoder {
    pub gate: Semaphore,
    pub dim: usize,
}

impl GatedEncoder {
    pub fn closed(dim: usize) -> Self {
        Self {
            gate: Semaphore::new(0),
            dim,
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

impl Encoder for GatedEncoder {
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>> {
        Box::pin(async move {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| EncodeError::Provider("gate closed".into()))?;
            permit.forget();
            Ok(fake_vector(text, self.dim))
        })
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Encoder whose every call panics, as a broken plug-in would.
pub struct PanickingEncoder {
    pub dim: usize,
}

impl Encoder for PanickingEncoder {
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>> {
        panic!("encoder crashed on {text:?}")
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
