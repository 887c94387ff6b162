//! Encoder configs loaded from environment variables.
//!
//! # Environment variables
//!
//! Common:
//! - `EMBEDDING_PROVIDER`     = `ollama` (default) or `openai`
//! - `EMBEDDING_MODEL`        = embedding model (mandatory)
//! - `EMBEDDING_TIMEOUT_SECS` = optional request timeout (default 30)
//!
//! Ollama-specific:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (mandatory)
//!
//! OpenAI-specific:
//! - `OPENAI_URL`     = base URL (default `https://api.openai.com`)
//! - `OPENAI_API_KEY` = API key (mandatory)

use crate::{
    config::{encoder_model_config::EncoderModelConfig, encoder_provider::EncoderProvider},
    error_handler::{
        ConfigError, EmbedServiceError, must_var, opt_u64, opt_var, validate_http_endpoint,
    },
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Builds the encoder config from an arbitrary variable lookup.
///
/// # Errors
///
/// - [`ConfigError::UnsupportedProvider`] for an unknown `EMBEDDING_PROVIDER`
/// - [`ConfigError::MissingVar`] for missing model, endpoint or API key
/// - [`ConfigError::InvalidNumber`] for a malformed port or timeout
/// - [`ConfigError::InvalidFormat`] for an endpoint without http(s) scheme
pub fn encoder_config_from<F>(lookup: F) -> Result<EncoderModelConfig, EmbedServiceError>
where
    F: Fn(&str) -> Option<String>,
{
    let provider = match opt_var(&lookup, "EMBEDDING_PROVIDER") {
        Some(s) => s.parse::<EncoderProvider>()?,
        None => EncoderProvider::Ollama,
    };
    let model = must_var(&lookup, "EMBEDDING_MODEL")?;
    let timeout_secs =
        opt_u64(&lookup, "EMBEDDING_TIMEOUT_SECS")?.or(Some(DEFAULT_TIMEOUT_SECS));

    let (endpoint, api_key) = match provider {
        EncoderProvider::Ollama => (ollama_endpoint(&lookup)?, None),
        EncoderProvider::OpenAi => {
            let url = opt_var(&lookup, "OPENAI_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.into());
            validate_http_endpoint("OPENAI_URL", &url)?;
            let key = must_var(&lookup, "OPENAI_API_KEY")?;
            (url, Some(key))
        }
    };

    Ok(EncoderModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        timeout_secs,
    })
}

/// Resolves the Ollama endpoint.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
fn ollama_endpoint<F>(lookup: &F) -> Result<String, EmbedServiceError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = opt_var(lookup, "OLLAMA_URL") {
        validate_http_endpoint("OLLAMA_URL", &url)?;
        return Ok(url);
    }
    if let Some(port) = opt_var(lookup, "OLLAMA_PORT") {
        port.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
            var: "OLLAMA_PORT",
            reason: "expected u16 (1..=65535)",
        })?;
        return Ok(format!("http://localhost:{port}"));
    }
    Err(ConfigError::MissingVar("OLLAMA_URL or OLLAMA_PORT").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn ollama_port_expands_to_localhost() {
        let cfg = encoder_config_from(lookup_from(&[
            ("EMBEDDING_MODEL", "nomic-embed-text"),
            ("OLLAMA_PORT", "11434"),
        ]))
        .unwrap();
        assert_eq!(cfg.provider, EncoderProvider::Ollama);
        assert_eq!(cfg.endpoint, "http://localhost:11434");
        assert_eq!(cfg.timeout_secs, Some(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn openai_requires_key() {
        let err = encoder_config_from(lookup_from(&[
            ("EMBEDDING_PROVIDER", "openai"),
            ("EMBEDDING_MODEL", "text-embedding-3-small"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            EmbedServiceError::Config(ConfigError::MissingVar("OPENAI_API_KEY"))
        ));
    }

    #[test]
    fn openai_defaults_url() {
        let cfg = encoder_config_from(lookup_from(&[
            ("EMBEDDING_PROVIDER", "openai"),
            ("EMBEDDING_MODEL", "text-embedding-3-small"),
            ("OPENAI_API_KEY", "sk-test"),
            ("EMBEDDING_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.endpoint, DEFAULT_OPENAI_URL);
        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.timeout_secs, Some(5));
    }

    #[test]
    fn missing_endpoint_is_reported() {
        let err = encoder_config_from(lookup_from(&[("EMBEDDING_MODEL", "m")])).unwrap_err();
        assert!(matches!(err, EmbedServiceError::Config(ConfigError::MissingVar(_))));
    }
}
