//! Encoder abstraction.
//!
//! Async is required because real encoders sit behind HTTP (Ollama, OpenAI,
//! inference servers). Implementations must be safe to call from every worker
//! at once.

use futures::future::BoxFuture;

use crate::document::Embedding;
use crate::errors::EncodeError;

pub mod serialized;
pub mod service;

pub use serialized::SerializedEncoder;
pub use service::ServiceEncoder;

/// Text → fixed-dimension vector.
///
/// Implement this trait to plug in your own embedding backend.
pub trait Encoder: Send + Sync {
    /// Encodes `text` into a vector of [`Encoder::dim`] components.
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>>;

    /// Dimensionality every returned vector has.
    fn dim(&self) -> usize;
}

impl<E: Encoder + ?Sized> Encoder for std::sync::Arc<E> {
    fn encode<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Embedding, EncodeError>> {
        (**self).encode(text)
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }
}

/// Fails with [`EncodeError::DimensionMismatch`] unless `v` has `want` components.
pub(crate) fn check_dim(v: Embedding, want: usize) -> Result<Embedding, EncodeError> {
    if v.len() != want {
        return Err(EncodeError::DimensionMismatch { got: v.len(), want });
    }
    Ok(v)
}
