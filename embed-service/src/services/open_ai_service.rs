//! OpenAI-compatible embeddings service.
//!
//! Minimal client around the `/v1/embeddings` REST contract, which is also
//! served by many self-hosted inference servers (TEI, vLLM, LocalAI).
//!
//! Constructor validation:
//! - `cfg.provider` must be `EncoderProvider::OpenAi`
//! - `cfg.api_key` must be present
//! - `cfg.endpoint` must start with http:// or https://

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    config::{encoder_model_config::EncoderModelConfig, encoder_provider::EncoderProvider},
    error_handler::{EmbedServiceError, Result, make_snippet, validate_http_endpoint},
};

/// Thin client for an OpenAI-compatible embeddings endpoint.
///
/// Keeps a preconfigured `reqwest::Client` (timeout + bearer header).
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: EncoderModelConfig,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - [`EmbedServiceError::InvalidProvider`] if `cfg.provider` is not OpenAI
    /// - [`EmbedServiceError::MissingApiKey`] if `cfg.api_key` is `None`
    /// - [`EmbedServiceError::Config`] if `cfg.endpoint` is invalid
    /// - [`EmbedServiceError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: EncoderModelConfig) -> Result<Self> {
        if cfg.provider != EncoderProvider::OpenAi {
            return Err(EmbedServiceError::InvalidProvider { expected: "openai" });
        }

        let api_key = cfg
            .api_key
            .clone()
            .ok_or(EmbedServiceError::MissingApiKey("openai"))?;

        let endpoint = cfg.endpoint.trim();
        validate_http_endpoint("OPENAI_URL", endpoint)?;

        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                EmbedServiceError::Decode(format!("invalid API key header: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_embeddings = format!("{base}/v1/embeddings");

        Ok(Self {
            client,
            cfg,
            url_embeddings,
        })
    }

    /// Retrieves a single embeddings vector via `/v1/embeddings`.
    ///
    /// # Errors
    /// - [`EmbedServiceError::HttpStatus`] for non-2xx responses
    /// - [`EmbedServiceError::HttpTransport`] for client/network failures
    /// - [`EmbedServiceError::Decode`] if the JSON cannot be parsed or has no data
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>> {
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input,
        };

        debug!(
            model = %self.cfg.model,
            input_len = input.len(),
            "POST {}", self.url_embeddings
        );

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
            let snippet = make_snippet(&text);

            error!(
                %status,
                %url,
                %snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "/v1/embeddings returned non-success status"
            );

            return Err(EmbedServiceError::HttpStatus {
                status,
                url,
                snippet,
            });
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            EmbedServiceError::Decode(format!("serde error: {e}; expected `data[0].embedding`"))
        })?;

        first_embedding(out)
    }

    /// Model this service was configured with.
    pub fn model(&self) -> &str {
        &self.cfg.model
    }
}

fn first_embedding(out: EmbeddingsResponse) -> Result<Vec<f32>> {
    out.data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EmbedServiceError::Decode("response has no embedding data".into()))
}

/* ==========================
HTTP payloads
========================== */

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(api_key: Option<&str>) -> EncoderModelConfig {
        EncoderModelConfig {
            provider: EncoderProvider::OpenAi,
            model: "text-embedding-3-small".into(),
            endpoint: "https://api.openai.com".into(),
            api_key: api_key.map(str::to_string),
            timeout_secs: None,
        }
    }

    #[test]
    fn requires_api_key() {
        let err = OpenAiService::new(cfg(None)).unwrap_err();
        assert!(matches!(err, EmbedServiceError::MissingApiKey(_)));
    }

    #[test]
    fn decodes_first_vector() {
        let raw = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,-1.0]}]}"#;
        let parsed: EmbeddingsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_embedding(parsed).unwrap(), vec![0.5, -1.0]);
    }

    #[test]
    fn empty_data_is_a_decode_error() {
        let parsed: EmbeddingsResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(matches!(
            first_embedding(parsed),
            Err(EmbedServiceError::Decode(_))
        ));
    }

    #[test]
    fn builds_url() {
        let svc = OpenAiService::new(cfg(Some("sk-test"))).unwrap();
        assert_eq!(svc.url_embeddings, "https://api.openai.com/v1/embeddings");
    }
}
