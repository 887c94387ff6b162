//! Adds dense-vector sub-fields to the documents of an existing search index.
//!
//! For every configured field `F` the pipeline declares `F_Embedding`
//! (`dense_vector`, `dims = D`) and `F_Text` (`text`) in the mapping, scans the
//! whole collection once, encodes the text of `F` and merges both sub-fields
//! back into each document with a partial update. Documents whose `F_Text` is
//! already set are skipped, so re-running after an interruption only does the
//! missing work.
//!
//! Flow: `scanner` → bounded `queue` → N `worker`s → `store`, orchestrated by
//! [`pipeline::Pipeline`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use index_augment::{AugmentConfig, Pipeline, ElasticStore, ServiceEncoder};
//! use embed_service::EmbeddingService;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = AugmentConfig::from_env()?;
//! let svc = Arc::new(EmbeddingService::new(cfg.encoder.clone())?);
//! let encoder = Arc::new(ServiceEncoder::new(svc, cfg.pipeline.dim));
//! let scan = Arc::new(ElasticStore::new(&cfg.store)?);
//! let write = Arc::new(ElasticStore::new(&cfg.store)?);
//! let report = Pipeline::new(cfg.pipeline, scan, write, encoder).run().await?;
//! println!("updated {}", report.updated);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod encode;
pub mod errors;
pub mod extract;
pub mod mapping;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod retry;
pub mod scanner;
pub mod stats;
pub mod store;
pub mod telemetry;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{AugmentConfig, PipelineConfig};
pub use document::{Document, Embedding, FieldSpec, UpdatePayload};
pub use encode::{Encoder, SerializedEncoder, ServiceEncoder};
pub use errors::{
    AugmentError, AugmentResult, EncodeError, ScanError, SchemaError, StoreError, UpdateError,
};
pub use extract::extract;
pub use mapping::{SchemaOutcome, extend_schema};
pub use normalize::normalize_whitespace;
pub use pipeline::Pipeline;
pub use retry::RetryPolicy;
pub use stats::{PipelineReport, PipelineStats};
pub use store::{ElasticConfig, ElasticStore, MemoryStore, RemoteStore};
pub use worker::{Indexer, SemanticIndexer};
