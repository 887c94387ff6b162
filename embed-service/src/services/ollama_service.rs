//! Lightweight Ollama service for embeddings.
//!
//! This module implements a thin client for the local Ollama API:
//! - `POST {endpoint}/api/embeddings` : embeddings retrieval
//!
//! It uses the universal configuration [`EncoderModelConfig`] and ensures
//! that the selected provider is [`EncoderProvider::Ollama`].
//!
//! # Examples
//!
//! ```no_run
//! use embed_service::config::encoder_model_config::EncoderModelConfig;
//! use embed_service::config::encoder_provider::EncoderProvider;
//! use embed_service::services::ollama_service::OllamaService;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = EncoderModelConfig {
//!     provider: EncoderProvider::Ollama,
//!     model: "nomic-embed-text".into(),
//!     endpoint: "http://localhost:11434".into(),
//!     api_key: None,
//!     timeout_secs: Some(30),
//! };
//!
//! let svc = OllamaService::new(cfg)?;
//! let vec = svc.embeddings("Ferris is a friendly crab.").await?;
//! println!("Embeddings dimension = {}", vec.len());
//! # Ok(()) }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::encoder_model_config::EncoderModelConfig;
use crate::config::encoder_provider::EncoderProvider;
use crate::error_handler::{EmbedServiceError, Result, make_snippet, validate_http_endpoint};

/// Thin client for Ollama embeddings.
///
/// Reuses one HTTP client (connection pool) with a configurable timeout;
/// `reqwest::Client` is safe to share across tasks.
#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: EncoderModelConfig,
    url_embeddings: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - [`EmbedServiceError::InvalidProvider`] if `cfg.provider` is not `Ollama`
    /// - [`EmbedServiceError::Config`] if `cfg.endpoint` is invalid
    /// - [`EmbedServiceError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: EncoderModelConfig) -> Result<Self> {
        if cfg.provider != EncoderProvider::Ollama {
            return Err(EmbedServiceError::InvalidProvider { expected: "ollama" });
        }

        let endpoint = cfg.endpoint.trim();
        validate_http_endpoint("OLLAMA_URL", endpoint)?;

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_embeddings = format!("{base}/api/embeddings");

        Ok(Self {
            client,
            cfg,
            url_embeddings,
        })
    }

    /// Retrieves embeddings via `/api/embeddings`.
    ///
    /// # Errors
    /// - [`EmbedServiceError::HttpStatus`] for non-2xx responses
    /// - [`EmbedServiceError::HttpTransport`] for client errors
    /// - [`EmbedServiceError::Decode`] if the response cannot be parsed
    #[instrument(skip_all, fields(model = %self.cfg.model, input_len = input.len()))]
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>> {
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            prompt: input,
        };

        debug!("POST {}", self.url_embeddings);
        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_embeddings.clone();
            let text = resp.text().await.unwrap_or_default();
            return Err(EmbedServiceError::HttpStatus {
                status,
                url,
                snippet: make_snippet(&text),
            });
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            EmbedServiceError::Decode(format!(
                "serde error: {e}; expected `{{ embedding: number[] }}`"
            ))
        })?;

        if out.embedding.is_empty() {
            return Err(EmbedServiceError::Decode("empty embedding".into()));
        }

        Ok(out.embedding)
    }

    /// Model this service was configured with.
    pub fn model(&self) -> &str {
        &self.cfg.model
    }
}

/* ==========================
HTTP payloads
========================== */

/// Request body for `/api/embeddings`.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Response body for `/api/embeddings`.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: EncoderProvider, endpoint: &str) -> EncoderModelConfig {
        EncoderModelConfig {
            provider,
            model: "nomic-embed-text".into(),
            endpoint: endpoint.into(),
            api_key: None,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn rejects_foreign_provider() {
        let err = OllamaService::new(cfg(EncoderProvider::OpenAi, "http://x")).unwrap_err();
        assert!(matches!(err, EmbedServiceError::InvalidProvider { .. }));
    }

    #[test]
    fn builds_embeddings_url_without_double_slash() {
        let svc = OllamaService::new(cfg(EncoderProvider::Ollama, "http://localhost:11434/"))
            .unwrap();
        assert_eq!(svc.url_embeddings, "http://localhost:11434/api/embeddings");
        assert_eq!(svc.model(), "nomic-embed-text");
    }

    #[test]
    fn request_uses_prompt_key() {
        let body = EmbeddingsRequest {
            model: "m",
            prompt: "hello",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"model": "m", "prompt": "hello"}));
    }
}
