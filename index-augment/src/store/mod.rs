//! Remote document store seam.
//!
//! The pipeline needs four things from the search engine: read/extend the
//! mapping, scroll through every document, and merge partial updates. This
//! module keeps that surface small so the rest of the crate never sees
//! HTTP details.

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::document::{Document, UpdatePayload};
use crate::errors::StoreError;

pub mod elastic;
pub mod memory;

pub use elastic::{ElasticConfig, ElasticStore};
pub use memory::MemoryStore;

/// Parameters of a full-collection scroll.
#[derive(Clone, Debug)]
pub struct ScanRequest {
    pub collection: String,
    /// Documents per page.
    pub page_size: usize,
    /// Scroll context TTL between pages, e.g. `5m`.
    pub keep_alive: String,
    /// `_source` filter; empty = full source.
    pub source_fields: Vec<String>,
}

/// One page of a scroll.
#[derive(Clone, Debug, Default)]
pub struct ScanPage {
    pub documents: Vec<Document>,
    /// Cursor for the next page; `None` if the store returned none.
    pub cursor: Option<String>,
}

/// A queued partial update inside a bulk request.
#[derive(Clone, Debug)]
pub struct BulkItem {
    pub id: String,
    pub payload: UpdatePayload,
}

/// Operations consumed from the remote store.
///
/// Implementations must be safe for concurrent use.
pub trait RemoteStore: Send + Sync {
    /// Top-level `properties` of the collection mapping.
    fn get_mapping<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Map<String, Value>, StoreError>>;

    /// Additively merges `properties` into the collection mapping.
    fn put_mapping<'a>(
        &'a self,
        collection: &'a str,
        properties: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Number of documents in the collection.
    fn count<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<u64, StoreError>>;

    /// Opens a scroll (`cursor = None`) or fetches the next page.
    /// An empty page means the cursor is exhausted.
    fn scan_page<'a>(
        &'a self,
        request: &'a ScanRequest,
        cursor: Option<&'a str>,
    ) -> BoxFuture<'a, Result<ScanPage, StoreError>>;

    /// Releases a scroll context.
    fn clear_scan<'a>(&'a self, cursor: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Merges `payload` into document `id`. Fields outside the payload are untouched.
    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        payload: &'a UpdatePayload,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Merges several payloads in one round trip.
    ///
    /// The outer error means the whole request failed; otherwise there is
    /// one result per item, in order.
    fn bulk_update<'a>(
        &'a self,
        collection: &'a str,
        items: &'a [BulkItem],
    ) -> BoxFuture<'a, Result<Vec<Result<(), StoreError>>, StoreError>>;
}
