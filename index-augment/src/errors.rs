//! Error hierarchy for index augmentation.
//!
//! Fatal errors (`SchemaError`, `ScanError`) abort a run and surface through
//! [`AugmentError`]. Local errors (`EncodeError`, `UpdateError`) never leave
//! the worker loop; they are logged and counted in the report.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type AugmentResult<T> = Result<T, AugmentError>;

/// Root error type returned by the pipeline and its constructors.
#[derive(Debug, Error)]
pub enum AugmentError {
    // ── Configuration / environment ──────────────────────────────────────────
    /// Required environment variable is missing.
    #[error("missing env variable: {key}")]
    EnvMissing { key: String },

    /// Failed to parse an environment variable into the expected type.
    #[error("failed to parse env variable: {key} = '{value}'")]
    EnvParse { key: String, value: String },

    /// Configuration combination is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    // ── Fatal pipeline errors ────────────────────────────────────────────────
    /// Schema could not be extended; nothing was processed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Scan failed; the run is incomplete and must be retried.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Store client could not be constructed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Encoder client could not be constructed.
    #[error(transparent)]
    Encoder(#[from] embed_service::EmbedServiceError),

    /// A spawned task panicked or was aborted.
    #[error("task failed: {0}")]
    Task(String),
}

/// Transport-level failure talking to the remote store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network/transport failure without HTTP status (DNS/connect/reset/timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream returned a non-successful HTTP status.
    #[error("HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        status: u16,
        url: String,
        snippet: String,
    },

    /// Unexpected/invalid shape of a store response.
    #[error("decode error: {0}")]
    Decode(String),

    /// The request could not be built (bad URL, bad id).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    /// HTTP status, if the store answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::HttpStatus { status, .. } => Some(*status),
            StoreError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Retryable: connect/timeout/body transport failures, 408, 409 (version
    /// conflict), 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            StoreError::HttpStatus { status, .. } => {
                matches!(*status, 408 | 409 | 429) || (500..=599).contains(status)
            }
            StoreError::Decode(_) | StoreError::InvalidRequest(_) => false,
        }
    }
}

/// Mapping extension failure. Aborts startup.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Current mapping could not be read.
    #[error("failed to read mapping of '{collection}': {source}")]
    Lookup {
        collection: String,
        source: StoreError,
    },

    /// The store refused the mapping delta.
    #[error("mapping update rejected for '{collection}': {source}")]
    Rejected {
        collection: String,
        source: StoreError,
    },

    /// A synthesized field exists with an incompatible declaration.
    #[error("field '{field}' is already mapped as {existing}, wanted {wanted}")]
    Conflict {
        field: String,
        existing: String,
        wanted: String,
    },
}

/// Scroll scan failure. Aborts the run.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Scroll request failed (cursor expiry, network).
    #[error("scroll failed: {0}")]
    Store(#[from] StoreError),

    /// A hit had no usable id or source.
    #[error("malformed hit: {0}")]
    MalformedHit(String),
}

/// Encoding failure for a single field. The field is skipped.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Provider call failed.
    #[error("encoder failed: {0}")]
    Provider(String),

    /// Vector length differs from the configured dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },
}

impl From<embed_service::EmbedServiceError> for EncodeError {
    fn from(e: embed_service::EmbedServiceError) -> Self {
        EncodeError::Provider(e.to_string())
    }
}

/// Write failure for a single document, after retries.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Retryable failure that persisted through every attempt.
    #[error("update of '{id}' failed after {attempts} attempts: {source}")]
    Exhausted {
        id: String,
        attempts: u32,
        source: StoreError,
    },

    /// Non-retryable rejection (bad payload, missing document, mapping clash).
    #[error("update of '{id}' rejected: {source}")]
    Rejected { id: String, source: StoreError },
}

impl UpdateError {
    /// Id of the document that failed.
    pub fn id(&self) -> &str {
        match self {
            UpdateError::Exhausted { id, .. } | UpdateError::Rejected { id, .. } => id,
        }
    }
}
