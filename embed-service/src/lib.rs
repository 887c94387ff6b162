//! Embedding providers behind one handle.
//!
//! - Construct [`EmbeddingService`] once from an [`EncoderModelConfig`]
//!   (usually [`config::default_config::encoder_config_from`] over the process
//!   environment).
//! - Wrap it in `Arc` and share it; the underlying HTTP clients are safe for
//!   concurrent use.

pub mod config;
pub mod error_handler;
pub mod services;

pub use config::encoder_model_config::EncoderModelConfig;
pub use config::encoder_provider::EncoderProvider;
pub use error_handler::EmbedServiceError;

use services::{ollama_service::OllamaService, open_ai_service::OpenAiService};
use tracing::info;

/// Embedding backend selected at construction time.
#[derive(Debug)]
pub enum EmbeddingService {
    Ollama(OllamaService),
    OpenAi(OpenAiService),
}

impl EmbeddingService {
    /// Builds the client matching `cfg.provider`.
    ///
    /// # Errors
    /// Propagates provider constructor errors (bad endpoint, missing key).
    pub fn new(cfg: EncoderModelConfig) -> Result<Self, EmbedServiceError> {
        info!(
            provider = cfg.provider.as_str(),
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            "embedding service initialized"
        );
        match cfg.provider {
            EncoderProvider::Ollama => OllamaService::new(cfg).map(Self::Ollama),
            EncoderProvider::OpenAi => OpenAiService::new(cfg).map(Self::OpenAi),
        }
    }

    /// Computes the embedding of `input`.
    ///
    /// # Errors
    /// Returns [`EmbedServiceError`] if the request or decoding fails.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, EmbedServiceError> {
        match self {
            Self::Ollama(svc) => svc.embeddings(input).await,
            Self::OpenAi(svc) => svc.embeddings(input).await,
        }
    }

    /// Model name, for logs.
    pub fn model(&self) -> &str {
        match self {
            Self::Ollama(svc) => svc.model(),
            Self::OpenAi(svc) => svc.model(),
        }
    }
}
