//! Runtime configuration read from environment variables.
//!
//! Every constructor has a `*_from_lookup` twin taking `Fn(&str) -> Option<String>`
//! so tests can inject variables without touching the process environment.
//!
//! Environment variables:
//! - `ES_URL` (default `http://localhost:9200`), `ES_USERNAME`, `ES_PASSWORD`,
//!   `ES_API_KEY`, `ES_TIMEOUT_SECS` (60), `RETRY_ON_CONFLICT` (3)
//! - `INDEX_NAME` (required), `FIELDS_TO_ENCODE` (required, comma-separated)
//! - `EMBEDDING_DIM` (768), `WORKER_COUNT` (6), `QUEUE_CAPACITY` (1000)
//! - `SCAN_PAGE_SIZE` (500), `SCROLL_KEEP_ALIVE` (`5m`)
//! - `UPDATE_BATCH_SIZE` (1), `UPDATE_MAX_ATTEMPTS` (5),
//!   `UPDATE_BACKOFF_MS` (200), `UPDATE_BACKOFF_MAX_MS` (10000)
//! - `ENCODER_MAX_IN_FLIGHT` (0 = unlimited), `SHOW_PROGRESS` (true)
//! - encoder variables, see `embed_service::config::default_config`

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use embed_service::EncoderModelConfig;
use embed_service::config::default_config::encoder_config_from;

use crate::document::FieldSpec;
use crate::errors::{AugmentError, AugmentResult};
use crate::retry::RetryPolicy;
use crate::store::{ElasticConfig, ScanRequest};

const DEFAULT_ES_URL: &str = "http://localhost:9200";

/// Knobs of one augmentation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Target collection (index or alias).
    pub collection: String,
    /// Fields to encode, in order.
    pub fields: Vec<FieldSpec>,
    /// Vector dimensionality `D`.
    pub dim: usize,
    pub workers: usize,
    /// Queue bound `C`.
    pub queue_capacity: usize,
    pub page_size: usize,
    pub keep_alive: String,
    /// 1 = one `_update` per document, more = `_bulk` of that many.
    pub batch_size: usize,
    pub retry: RetryPolicy,
    /// Concurrent encoder calls; 0 = unlimited.
    pub encoder_max_in_flight: usize,
    pub show_progress: bool,
}

impl PipelineConfig {
    /// Defaults for everything except the required values.
    pub fn new(collection: impl Into<String>, fields: Vec<FieldSpec>, dim: usize) -> Self {
        Self {
            collection: collection.into(),
            fields,
            dim,
            workers: 6,
            queue_capacity: 1000,
            page_size: 500,
            keep_alive: "5m".to_string(),
            batch_size: 1,
            retry: RetryPolicy::default(),
            encoder_max_in_flight: 0,
            show_progress: true,
        }
    }

    pub fn validate(&self) -> AugmentResult<()> {
        if self.collection.trim().is_empty() {
            return Err(AugmentError::Config("collection is empty".into()));
        }
        if self.fields.is_empty() {
            return Err(AugmentError::Config("no fields to encode".into()));
        }
        let mut seen = HashSet::new();
        for f in &self.fields {
            if f.name().trim().is_empty() {
                return Err(AugmentError::Config("empty field name".into()));
            }
            if !seen.insert(f.name()) {
                return Err(AugmentError::Config(format!(
                    "field '{}' listed twice",
                    f.name()
                )));
            }
        }
        if self.dim == 0 {
            return Err(AugmentError::Config("embedding dim must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(AugmentError::Config("worker count must be > 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(AugmentError::Config("queue capacity must be > 0".into()));
        }
        if self.page_size == 0 {
            return Err(AugmentError::Config("scan page size must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(AugmentError::Config("update batch size must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(AugmentError::Config("update attempts must be > 0".into()));
        }
        Ok(())
    }

    /// Scroll parameters for this run.
    ///
    /// The page is capped at `queue_capacity`: the scanner buffers one page
    /// besides the queue, so at most `2 * queue_capacity + workers` documents
    /// are held in memory.
    pub fn scan_request(&self) -> ScanRequest {
        ScanRequest {
            collection: self.collection.clone(),
            page_size: self.page_size.min(self.queue_capacity),
            keep_alive: self.keep_alive.clone(),
            source_fields: self.source_fields(),
        }
    }

    /// `_source` filter for the scan: the fields and their `_Text` markers.
    pub fn source_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|f| [f.name().to_string(), f.text_key()])
            .collect()
    }
}

/// Everything the binary needs to run.
#[derive(Debug, Clone)]
pub struct AugmentConfig {
    pub store: ElasticConfig,
    pub pipeline: PipelineConfig,
    pub encoder: EncoderModelConfig,
}

impl AugmentConfig {
    /// Reads the process environment.
    pub fn from_env() -> AugmentResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Reads variables through `lookup` and validates the result.
    ///
    /// # Errors
    /// - [`AugmentError::EnvMissing`] for a missing required variable
    /// - [`AugmentError::EnvParse`] for a malformed number or flag
    /// - [`AugmentError::Config`] for invalid combinations
    /// - [`AugmentError::Encoder`] for invalid encoder variables
    pub fn from_lookup<F>(lookup: F) -> AugmentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = store_config(&lookup)?;
        let pipeline = pipeline_config(&lookup)?;
        pipeline.validate()?;
        let encoder = encoder_config_from(&lookup)?;
        Ok(Self {
            store,
            pipeline,
            encoder,
        })
    }
}

fn store_config<F>(lookup: &F) -> AugmentResult<ElasticConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let url = opt(lookup, "ES_URL").unwrap_or_else(|| DEFAULT_ES_URL.to_string());
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AugmentError::Config(format!(
            "ES_URL must start with http:// or https://, got '{url}'"
        )));
    }

    let mut cfg = ElasticConfig::new(url);
    cfg.username = opt(lookup, "ES_USERNAME");
    cfg.password = opt(lookup, "ES_PASSWORD");
    cfg.api_key = opt(lookup, "ES_API_KEY");
    cfg.timeout_secs = parsed(lookup, "ES_TIMEOUT_SECS", cfg.timeout_secs)?;
    cfg.retry_on_conflict = parsed(lookup, "RETRY_ON_CONFLICT", cfg.retry_on_conflict)?;
    if cfg.password.is_some() && cfg.username.is_none() {
        return Err(AugmentError::Config(
            "ES_PASSWORD is set but ES_USERNAME is not".into(),
        ));
    }
    Ok(cfg)
}

fn pipeline_config<F>(lookup: &F) -> AugmentResult<PipelineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let collection = required(lookup, "INDEX_NAME")?;
    let fields = parse_fields(&required(lookup, "FIELDS_TO_ENCODE")?);
    let dim = parsed(lookup, "EMBEDDING_DIM", 768usize)?;

    let mut cfg = PipelineConfig::new(collection, fields, dim);
    cfg.workers = parsed(lookup, "WORKER_COUNT", cfg.workers)?;
    cfg.queue_capacity = parsed(lookup, "QUEUE_CAPACITY", cfg.queue_capacity)?;
    cfg.page_size = parsed(lookup, "SCAN_PAGE_SIZE", cfg.page_size)?;
    cfg.keep_alive = opt(lookup, "SCROLL_KEEP_ALIVE").unwrap_or(cfg.keep_alive);
    cfg.batch_size = parsed(lookup, "UPDATE_BATCH_SIZE", cfg.batch_size)?;

    let attempts = parsed(lookup, "UPDATE_MAX_ATTEMPTS", cfg.retry.max_attempts)?;
    if attempts == 0 {
        return Err(AugmentError::Config("UPDATE_MAX_ATTEMPTS must be > 0".into()));
    }
    let base_ms = parsed(lookup, "UPDATE_BACKOFF_MS", 200u64)?;
    let max_ms = parsed(lookup, "UPDATE_BACKOFF_MAX_MS", 10_000u64)?;
    cfg.retry = RetryPolicy::new(
        attempts,
        Duration::from_millis(base_ms),
        Duration::from_millis(max_ms.max(base_ms)),
    );

    cfg.encoder_max_in_flight = parsed(lookup, "ENCODER_MAX_IN_FLIGHT", 0usize)?;
    cfg.show_progress = match opt(lookup, "SHOW_PROGRESS") {
        Some(v) => parse_flag("SHOW_PROGRESS", &v)?,
        None => true,
    };
    Ok(cfg)
}

/// `"Summary, Title,,"` → `[Summary, Title]`.
pub fn parse_fields(raw: &str) -> Vec<FieldSpec> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(FieldSpec::new)
        .collect()
}

/// Trimmed, non-empty value.
fn opt<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> AugmentResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    opt(lookup, key).ok_or_else(|| AugmentError::EnvMissing {
        key: key.to_string(),
    })
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> AugmentResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match opt(lookup, key) {
        None => Ok(default),
        Some(v) => v.parse::<T>().map_err(|_| AugmentError::EnvParse {
            key: key.to_string(),
            value: v,
        }),
    }
}

fn parse_flag(key: &str, v: &str) -> AugmentResult<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AugmentError::EnvParse {
            key: key.to_string(),
            value: v.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("INDEX_NAME", "papers"),
            ("FIELDS_TO_ENCODE", "Summary, Title"),
            ("EMBEDDING_MODEL", "nomic-embed-text"),
            ("OLLAMA_URL", "http://localhost:11434"),
        ]
    }

    #[test]
    fn defaults_apply() {
        let cfg = AugmentConfig::from_lookup(lookup(&minimal())).unwrap();
        assert_eq!(cfg.store.url, "http://localhost:9200");
        assert_eq!(cfg.store.retry_on_conflict, 3);
        let p = &cfg.pipeline;
        assert_eq!(p.collection, "papers");
        assert_eq!(p.fields, vec![FieldSpec::new("Summary"), FieldSpec::new("Title")]);
        assert_eq!(p.dim, 768);
        assert_eq!(p.workers, 6);
        assert_eq!(p.queue_capacity, 1000);
        assert_eq!(p.batch_size, 1);
        assert_eq!(p.retry.max_attempts, 5);
        assert!(p.show_progress);
        assert_eq!(cfg.encoder.model, "nomic-embed-text");
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = minimal();
        vars.extend([
            ("WORKER_COUNT", "2"),
            ("QUEUE_CAPACITY", "10"),
            ("UPDATE_BATCH_SIZE", "50"),
            ("UPDATE_BACKOFF_MS", "5"),
            ("UPDATE_BACKOFF_MAX_MS", "1"),
            ("SHOW_PROGRESS", "off"),
            ("ES_URL", "https://es:9243"),
        ]);
        let cfg = AugmentConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(cfg.pipeline.workers, 2);
        assert_eq!(cfg.pipeline.queue_capacity, 10);
        assert_eq!(cfg.pipeline.batch_size, 50);
        assert_eq!(cfg.pipeline.retry.max_delay, Duration::from_millis(5));
        assert!(!cfg.pipeline.show_progress);
        assert_eq!(cfg.store.url, "https://es:9243");
    }

    #[test]
    fn missing_index_is_reported() {
        let vars: Vec<_> = minimal()
            .into_iter()
            .filter(|(k, _)| *k != "INDEX_NAME")
            .collect();
        let err = AugmentConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, AugmentError::EnvMissing { key } if key == "INDEX_NAME"));
    }

    #[test]
    fn garbage_number_is_parse_error() {
        let mut vars = minimal();
        vars.push(("WORKER_COUNT", "many"));
        let err = AugmentConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, AugmentError::EnvParse { key, value } if key == "WORKER_COUNT" && value == "many"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (k, v) in [
            ("WORKER_COUNT", "0"),
            ("QUEUE_CAPACITY", "0"),
            ("EMBEDDING_DIM", "0"),
            ("UPDATE_BATCH_SIZE", "0"),
            ("UPDATE_MAX_ATTEMPTS", "0"),
            ("FIELDS_TO_ENCODE", "Summary,Summary"),
            ("FIELDS_TO_ENCODE", " , "),
            ("ES_URL", "localhost:9200"),
        ] {
            let mut vars: Vec<_> = minimal().into_iter().filter(|(key, _)| *key != k).collect();
            vars.push((k, v));
            let err = AugmentConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, AugmentError::Config(_)), "{k}={v}: {err}");
        }
    }

    #[test]
    fn missing_model_surfaces_encoder_error() {
        let vars: Vec<_> = minimal()
            .into_iter()
            .filter(|(k, _)| *k != "EMBEDDING_MODEL")
            .collect();
        let err = AugmentConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, AugmentError::Encoder(_)));
    }

    #[test]
    fn source_filter_includes_markers() {
        let p = PipelineConfig::new("c", parse_fields("A,B"), 4);
        assert_eq!(p.source_fields(), vec!["A", "A_Text", "B", "B_Text"]);
    }

    #[test]
    fn scroll_page_never_exceeds_queue_capacity() {
        let mut p = PipelineConfig::new("c", parse_fields("A"), 4);
        p.queue_capacity = 10;
        let req = p.scan_request();
        assert_eq!(req.page_size, 10);
        assert_eq!(req.collection, "c");
        assert_eq!(req.source_fields, vec!["A", "A_Text"]);

        p.page_size = 3;
        assert_eq!(p.scan_request().page_size, 3);
    }
}
