//! Encoder backed by an HTTP embedding service.

use std::sync::Arc;

use embed_service::EmbeddingService;
use futures::future::BoxFuture;
use tracing::trace;

use crate::document::Embedding;
use crate::encode::{Encoder, check_dim};
use crate::errors::EncodeError;

/// Adapts [`EmbeddingService`] (Ollama or OpenAI-compatible) to [`Encoder`].
#[derive(Clone)]
pub struct ServiceEncoder {
    svc: Arc<EmbeddingService>,
    dim: usize,
}

impl ServiceEncoder {
    /// `dim` must match the mapping dimensionality; other lengths are rejected.
    pub fn new(svc: Arc<EmbeddingService>, dim: usize) -> Self {
        Self { svc, dim }
    }
}

impl Encoder for ServiceEncoder {
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>> {
        Box::pin(async move {
            trace!(model = self.svc.model(), text_len = text.len(), "encode");
            let v = self.svc.embed(text).await?;
            check_dim(v, self.dim)
        })
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
