//! Unified error handling for `embed-service`.
//!
//! This module exposes a single top-level error type [`EmbedServiceError`] for
//! the whole library, and groups configuration problems in [`ConfigError`].
//! Small helpers for reading/validating configuration values are provided and
//! return the unified [`Result<T>`] alias.
//!
//! All messages include the suffix `[Embed Service]` to simplify attribution in logs.

use reqwest::StatusCode;
use thiserror::Error;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, EmbedServiceError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `embed-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmbedServiceError {
    /// Configuration/validation errors (startup).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The service was constructed with a config for another provider.
    #[error("[Embed Service] invalid provider: expected {expected}")]
    InvalidProvider {
        /// Provider the service implements.
        expected: &'static str,
    },

    /// Provider requires an API key and none was configured.
    #[error("[Embed Service] missing API key for {0}")]
    MissingApiKey(&'static str),

    /// Underlying HTTP transport error (e.g., `reqwest::Error`).
    #[error("[Embed Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Upstream returned a non-successful HTTP status.
    #[error("[Embed Service] HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        /// Numeric HTTP status code.
        status: StatusCode,
        /// Request URL.
        url: String,
        /// Short snippet of the response body (trimmed).
        snippet: String,
    },

    /// Response payload could not be decoded as expected.
    #[error("[Embed Service] decode error: {0}")]
    Decode(String),
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required variable is missing or empty.
    #[error("[Embed Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (like ports or timeouts).
    #[error("[Embed Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `OLLAMA_PORT`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u64`).
        reason: &'static str,
    },

    /// Unsupported provider in `EMBEDDING_PROVIDER`.
    #[error("[Embed Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[Embed Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `OLLAMA_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// Model name was empty.
    #[error("[Embed Service] model name must not be empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* Lookup helpers (return unified `Result<T>`)                               */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty variable through `lookup`.
///
/// # Errors
/// Returns [`ConfigError::MissingVar`] if the variable is absent or empty.
pub fn must_var<F>(lookup: &F, name: &'static str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingVar(name).into()),
    }
}

/// Fetches an optional variable (`None` if unset or blank).
pub fn opt_var<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an optional `u64` (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`ConfigError::InvalidNumber`] if the variable is set but not a valid `u64`.
pub fn opt_u64<F>(lookup: &F, name: &'static str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match opt_var(lookup, name) {
        Some(v) => v.parse::<u64>().map(Some).map_err(|_| {
            EmbedServiceError::from(ConfigError::InvalidNumber {
                var: name,
                reason: "expected u64",
            })
        }),
        None => Ok(None),
    }
}

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// Returns [`ConfigError::InvalidFormat`] when the string does not start with
/// a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Takes at most 240 chars of an upstream body for error messages.
pub(crate) fn make_snippet(body: &str) -> String {
    body.trim().chars().take(240).collect()
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
    fn must_var_rejects_blank() {
        let lookup = lookup_from(&[("EMBEDDING_MODEL", "   ")]);
        let err = must_var(&lookup, "EMBEDDING_MODEL").unwrap_err();
        assert!(matches!(
            err,
            EmbedServiceError::Config(ConfigError::MissingVar("EMBEDDING_MODEL"))
        ));
    }

    #[test]
    fn opt_u64_parses_and_reports_garbage() {
        let lookup = lookup_from(&[("A", "42"), ("B", "forty")]);
        assert_eq!(opt_u64(&lookup, "A").unwrap(), Some(42));
        assert_eq!(opt_u64(&lookup, "C").unwrap(), None);
        assert!(opt_u64(&lookup, "B").is_err());
    }

    #[test]
    fn endpoint_scheme_is_checked() {
        assert!(validate_http_endpoint("OLLAMA_URL", "http://localhost:11434").is_ok());
        assert!(validate_http_endpoint("OLLAMA_URL", "localhost:11434").is_err());
    }
}
