//! In-process store with the merge and mapping rules of the real engine.
//!
//! Used by tests and dry runs. Scrolls are point-in-time snapshots, partial
//! updates merge top-level keys, mapping merges reject type changes with 400
//! and writes to unknown ids fail with 404.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use futures::future::{self, BoxFuture};
use serde_json::{Map, Value};

use crate::document::{Document, UpdatePayload};
use crate::errors::StoreError;
use crate::store::{BulkItem, RemoteStore, ScanPage, ScanRequest};

#[derive(Default)]
struct Collection {
    properties: Map<String, Value>,
    docs: BTreeMap<String, Map<String, Value>>,
}

struct Scroll {
    docs: Vec<Document>,
    pos: usize,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Collection>,
    scrolls: HashMap<String, Scroll>,
    next_scroll: u64,
    /// Queued failures per document id, consumed one per write attempt.
    update_failures: HashMap<String, VecDeque<u16>>,
    /// Remaining successful pages before every scroll call fails.
    scan_pages_before_failure: Option<usize>,
    writes: usize,
    mapping_puts: usize,
}

/// Thread-safe in-memory [`RemoteStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn status_error(status: u16, url: String, snippet: &str) -> StoreError {
    StoreError::HttpStatus {
        status,
        url,
        snippet: snippet.to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Creates an empty collection (no-op if it exists).
    pub fn create_collection(&self, name: &str) {
        self.state().collections.entry(name.to_string()).or_default();
    }

    /// Inserts or replaces a document, creating the collection on demand.
    pub fn insert(&self, collection: &str, doc: Document) {
        self.state()
            .collections
            .entry(collection.to_string())
            .or_default()
            .docs
            .insert(doc.id, doc.source);
    }

    /// Current source of a stored document.
    pub fn document(&self, collection: &str, id: &str) -> Option<Map<String, Value>> {
        self.state()
            .collections
            .get(collection)
            .and_then(|c| c.docs.get(id).cloned())
    }

    /// Current mapping properties of a collection.
    pub fn properties(&self, collection: &str) -> Option<Map<String, Value>> {
        self.state()
            .collections
            .get(collection)
            .map(|c| c.properties.clone())
    }

    /// Number of document merges applied so far (single and bulk).
    pub fn writes(&self) -> usize {
        self.state().writes
    }

    /// Number of accepted mapping updates.
    pub fn mapping_puts(&self) -> usize {
        self.state().mapping_puts
    }

    /// Makes the next write attempts for `id` fail with the given statuses, in order.
    pub fn fail_updates(&self, id: &str, statuses: &[u16]) {
        self.state()
            .update_failures
            .entry(id.to_string())
            .or_default()
            .extend(statuses.iter().copied());
    }

    /// After `pages` successful scroll pages, every further page request fails.
    pub fn fail_scan_after(&self, pages: usize) {
        self.state().scan_pages_before_failure = Some(pages);
    }

    /// Open scroll contexts (released ones are removed).
    pub fn open_scrolls(&self) -> usize {
        self.state().scrolls.len()
    }

    fn merge_mapping(
        &self,
        collection: &str,
        properties: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut st = self.state();
        let col = st
            .collections
            .get_mut(collection)
            .ok_or_else(|| status_error(404, format!("/{collection}/_mapping"), "index_not_found_exception"))?;

        for (name, wanted) in properties {
            if let Some(existing) = col.properties.get(name) {
                if existing.get("type") != wanted.get("type")
                    || existing.get("dims") != wanted.get("dims")
                {
                    return Err(status_error(
                        400,
                        format!("/{collection}/_mapping"),
                        &format!("illegal_argument_exception: mapper [{name}] cannot be changed"),
                    ));
                }
            }
        }
        for (name, wanted) in properties {
            col.properties.insert(name.clone(), wanted.clone());
        }
        st.mapping_puts += 1;
        Ok(())
    }

    fn next_page(&self, request: &ScanRequest, cursor: Option<&str>) -> Result<ScanPage, StoreError> {
        let mut st = self.state();

        if let Some(left) = st.scan_pages_before_failure.as_mut() {
            if *left == 0 {
                return Err(status_error(
                    404,
                    "/_search/scroll".into(),
                    "search_context_missing_exception",
                ));
            }
            *left -= 1;
        }

        let id = match cursor {
            Some(id) => id.to_string(),
            None => {
                let col = st.collections.get(&request.collection).ok_or_else(|| {
                    status_error(
                        404,
                        format!("/{}/_search", request.collection),
                        "index_not_found_exception",
                    )
                })?;
                let docs = col
                    .docs
                    .iter()
                    .map(|(id, src)| Document::new(id.clone(), filter_source(src, &request.source_fields)))
                    .collect();
                st.next_scroll += 1;
                let id = format!("scroll-{}", st.next_scroll);
                st.scrolls.insert(id.clone(), Scroll { docs, pos: 0 });
                id
            }
        };

        let scroll = st.scrolls.get_mut(&id).ok_or_else(|| {
            status_error(404, "/_search/scroll".into(), "search_context_missing_exception")
        })?;
        let end = (scroll.pos + request.page_size.max(1)).min(scroll.docs.len());
        let documents = scroll.docs[scroll.pos..end].to_vec();
        scroll.pos = end;

        Ok(ScanPage {
            documents,
            cursor: Some(id),
        })
    }

    fn merge_doc(&self, collection: &str, id: &str, payload: &UpdatePayload) -> Result<(), StoreError> {
        let mut st = self.state();
        let url = format!("/{collection}/_update/{id}");

        if let Some(queue) = st.update_failures.get_mut(id) {
            if let Some(status) = queue.pop_front() {
                return Err(status_error(status, url, "injected failure"));
            }
        }

        let col = st
            .collections
            .get_mut(collection)
            .ok_or_else(|| status_error(404, url.clone(), "index_not_found_exception"))?;
        let doc = col
            .docs
            .get_mut(id)
            .ok_or_else(|| status_error(404, url, "document_missing_exception"))?;
        for (k, v) in payload.as_map() {
            doc.insert(k.clone(), v.clone());
        }
        st.writes += 1;
        Ok(())
    }
}

fn filter_source(src: &Map<String, Value>, fields: &[String]) -> Map<String, Value> {
    if fields.is_empty() {
        return src.clone();
    }
    src.iter()
        .filter(|(k, _)| fields.iter().any(|f| f == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl RemoteStore for MemoryStore {
    fn get_mapping<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Map<String, Value>, StoreError>> {
        let res = self.properties(collection).ok_or_else(|| {
            status_error(404, format!("/{collection}/_mapping"), "index_not_found_exception")
        });
        Box::pin(future::ready(res))
    }

    fn put_mapping<'a>(
        &'a self,
        collection: &'a str,
        properties: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(future::ready(self.merge_mapping(collection, properties)))
    }

    fn count<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<u64, StoreError>> {
        let res = self
            .state()
            .collections
            .get(collection)
            .map(|c| c.docs.len() as u64)
            .ok_or_else(|| {
                status_error(404, format!("/{collection}/_count"), "index_not_found_exception")
            });
        Box::pin(future::ready(res))
    }

    fn scan_page<'a>(
        &'a self,
        request: &'a ScanRequest,
        cursor: Option<&'a str>,
    ) -> BoxFuture<'a, Result<ScanPage, StoreError>> {
        Box::pin(future::ready(self.next_page(request, cursor)))
    }

    fn clear_scan<'a>(&'a self, cursor: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        self.state().scrolls.remove(cursor);
        Box::pin(future::ready(Ok(())))
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        payload: &'a UpdatePayload,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(future::ready(self.merge_doc(collection, id, payload)))
    }

    fn bulk_update<'a>(
        &'a self,
        collection: &'a str,
        items: &'a [BulkItem],
    ) -> BoxFuture<'a, Result<Vec<Result<(), StoreError>>, StoreError>> {
        let results = items
            .iter()
            .map(|item| self.merge_doc(collection, &item.id, &item.payload))
            .collect();
        Box::pin(future::ready(Ok(results)))
    }
}
