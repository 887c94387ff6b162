//! Thin Elasticsearch REST facade.
//!
//! Concentrates every HTTP interaction with the search engine behind
//! [`RemoteStore`]:
//! - `GET    /{index}/_mapping`            : current properties
//! - `PUT    /{index}/_mapping`            : additive property merge
//! - `GET    /{index}/_count`              : progress total
//! - `POST   /{index}/_search?scroll=…`    : open scroll, sorted by `_doc`
//! - `POST   /_search/scroll`              : next page
//! - `DELETE /_search/scroll`              : release scroll context
//! - `POST   /{index}/_update/{id}`        : partial `doc` merge
//! - `POST   /{index}/_bulk`               : batched partial merges

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Method, RequestBuilder, Url, header};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, trace, warn};

use crate::document::{Document, UpdatePayload};
use crate::errors::StoreError;
use crate::store::{BulkItem, RemoteStore, ScanPage, ScanRequest};

/// Connection parameters for one Elasticsearch client.
#[derive(Clone, Debug)]
pub struct ElasticConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,
    /// Basic-auth user (paired with `password`).
    pub username: Option<String>,
    pub password: Option<String>,
    /// `Authorization: ApiKey …`; takes precedence over basic auth.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Server-side retries of a version conflict inside one update.
    pub retry_on_conflict: u32,
}

impl ElasticConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            api_key: None,
            timeout_secs: 60,
            retry_on_conflict: 3,
        }
    }
}

/// Elasticsearch client bound to one connection pool.
///
/// Build one instance for the scanner and another for the workers so that a
/// long-lived scroll and many short writes do not share a pool.
pub struct ElasticStore {
    client: reqwest::Client,
    base: Url,
    basic_auth: Option<(String, Option<String>)>,
    retry_on_conflict: u32,
}

impl ElasticStore {
    /// Builds a client from `cfg`.
    ///
    /// # Errors
    /// - [`StoreError::InvalidRequest`] if the URL is not http(s) or the API key is not a valid header
    /// - [`StoreError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: &ElasticConfig) -> Result<Self, StoreError> {
        let base = Url::parse(cfg.url.trim())
            .map_err(|e| StoreError::InvalidRequest(format!("ES url '{}': {e}", cfg.url)))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(StoreError::InvalidRequest(format!(
                "ES url '{}' must be http:// or https://",
                cfg.url
            )));
        }

        let mut headers = header::HeaderMap::new();
        if let Some(key) = &cfg.api_key {
            let value = header::HeaderValue::from_str(&format!("ApiKey {key}"))
                .map_err(|e| StoreError::InvalidRequest(format!("invalid API key header: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .default_headers(headers)
            .gzip(true)
            .build()?;

        let basic_auth = match (&cfg.api_key, &cfg.username) {
            (None, Some(user)) => Some((user.clone(), cfg.password.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base,
            basic_auth,
            retry_on_conflict: cfg.retry_on_conflict,
        })
    }

    /// `base` + percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRequest("ES url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let rb = self.client.request(method, url);
        match &self.basic_auth {
            Some((user, pass)) => rb.basic_auth(user, pass.as_ref()),
            None => rb,
        }
    }

    /// Sends and decodes a JSON answer; non-2xx becomes [`StoreError::HttpStatus`].
    async fn send_json(&self, rb: RequestBuilder, url: &Url) -> Result<Value, StoreError> {
        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(StoreError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
                snippet: text.trim().chars().take(240).collect(),
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(format!("{url}: {e}")))
    }

    #[instrument(skip(self))]
    async fn fetch_mapping(&self, collection: &str) -> Result<Map<String, Value>, StoreError> {
        let url = self.endpoint(&[collection, "_mapping"])?;
        let body = self
            .send_json(self.request(Method::GET, url.clone()), &url)
            .await?;
        parse_mapping_properties(&body)
    }

    #[instrument(skip(self, properties), fields(fields = properties.len()))]
    async fn send_mapping(
        &self,
        collection: &str,
        properties: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        let url = self.endpoint(&[collection, "_mapping"])?;
        let body = json!({ "properties": properties });
        debug!("PUT {url}");
        self.send_json(self.request(Method::PUT, url.clone()).json(&body), &url)
            .await?;
        Ok(())
    }

    async fn fetch_count(&self, collection: &str) -> Result<u64, StoreError> {
        let url = self.endpoint(&[collection, "_count"])?;
        let body = self
            .send_json(self.request(Method::GET, url.clone()), &url)
            .await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::Decode("`count` missing in _count response".into()))
    }

    #[instrument(skip_all, fields(collection = %request.collection, first = cursor.is_none()))]
    async fn fetch_page(
        &self,
        request: &ScanRequest,
        cursor: Option<&str>,
    ) -> Result<ScanPage, StoreError> {
        let (url, body) = match cursor {
            None => {
                let mut url = self.endpoint(&[request.collection.as_str(), "_search"])?;
                url.query_pairs_mut()
                    .append_pair("scroll", &request.keep_alive);
                (url, open_scroll_body(request))
            }
            Some(id) => {
                let url = self.endpoint(&["_search", "scroll"])?;
                (url, json!({ "scroll": request.keep_alive, "scroll_id": id }))
            }
        };

        trace!("POST {url}");
        let resp = self
            .send_json(self.request(Method::POST, url.clone()).json(&body), &url)
            .await?;
        parse_scroll_page(&resp)
    }

    async fn release_scroll(&self, cursor: &str) -> Result<(), StoreError> {
        let url = self.endpoint(&["_search", "scroll"])?;
        let body = json!({ "scroll_id": [cursor] });
        match self
            .send_json(self.request(Method::DELETE, url.clone()).json(&body), &url)
            .await
        {
            Ok(_) => Ok(()),
            // Already expired.
            Err(StoreError::HttpStatus { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, payload), fields(fields = payload.encoded_fields()))]
    async fn send_update(
        &self,
        collection: &str,
        id: &str,
        payload: &UpdatePayload,
    ) -> Result<(), StoreError> {
        let mut url = self.endpoint(&[collection, "_update", id])?;
        url.query_pairs_mut()
            .append_pair("retry_on_conflict", &self.retry_on_conflict.to_string());
        let body = json!({ "doc": payload.as_map() });
        self.send_json(self.request(Method::POST, url.clone()).json(&body), &url)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    async fn send_bulk(
        &self,
        collection: &str,
        items: &[BulkItem],
    ) -> Result<Vec<Result<(), StoreError>>, StoreError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.endpoint(&[collection, "_bulk"])?;
        let body = bulk_body(items, self.retry_on_conflict)?;
        let rb = self
            .request(Method::POST, url.clone())
            .header(header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let resp = self.send_json(rb, &url).await?;
        parse_bulk_response(&resp, items)
    }
}

impl RemoteStore for ElasticStore {
    fn get_mapping<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Map<String, Value>, StoreError>> {
        Box::pin(self.fetch_mapping(collection))
    }

    fn put_mapping<'a>(
        &'a self,
        collection: &'a str,
        properties: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.send_mapping(collection, properties))
    }

    fn count<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<u64, StoreError>> {
        Box::pin(self.fetch_count(collection))
    }

    fn scan_page<'a>(
        &'a self,
        request: &'a ScanRequest,
        cursor: Option<&'a str>,
    ) -> BoxFuture<'a, Result<ScanPage, StoreError>> {
        Box::pin(self.fetch_page(request, cursor))
    }

    fn clear_scan<'a>(&'a self, cursor: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.release_scroll(cursor))
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        payload: &'a UpdatePayload,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.send_update(collection, id, payload))
    }

    fn bulk_update<'a>(
        &'a self,
        collection: &'a str,
        items: &'a [BulkItem],
    ) -> BoxFuture<'a, Result<Vec<Result<(), StoreError>>, StoreError>> {
        Box::pin(self.send_bulk(collection, items))
    }
}

// ---------- wire helpers ----------

/// Body of the initial scroll search.
fn open_scroll_body(request: &ScanRequest) -> Value {
    let mut body = json!({
        "size": request.page_size,
        "sort": ["_doc"],
        "query": { "match_all": {} },
    });
    if !request.source_fields.is_empty() {
        body["_source"] = json!(request.source_fields);
    }
    body
}

/// Collects `properties` of every index in a `_mapping` response (an alias may
/// resolve to several). The first declaration of a name wins.
fn parse_mapping_properties(body: &Value) -> Result<Map<String, Value>, StoreError> {
    let indices = body
        .as_object()
        .ok_or_else(|| StoreError::Decode("_mapping response is not an object".into()))?;

    let mut out = Map::new();
    for (index, entry) in indices {
        let Some(props) = entry
            .get("mappings")
            .and_then(|m| m.get("properties"))
            .and_then(Value::as_object)
        else {
            trace!("index '{index}' has no properties yet");
            continue;
        };
        for (name, decl) in props {
            out.entry(name.clone()).or_insert_with(|| decl.clone());
        }
    }
    Ok(out)
}

/// Converts a scroll response into a [`ScanPage`].
fn parse_scroll_page(body: &Value) -> Result<ScanPage, StoreError> {
    let cursor = body
        .get("_scroll_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let hits = body
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::Decode("scroll response has no hits.hits".into()))?;

    let mut documents = Vec::with_capacity(hits.len());
    for hit in hits {
        let id = hit
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode("hit without _id".into()))?;
        let source = hit.get("_source").cloned().unwrap_or(Value::Null);
        documents.push(Document::from_json(id, source));
    }

    Ok(ScanPage { documents, cursor })
}

/// NDJSON body of a `_bulk` request made of `update` actions.
fn bulk_body(items: &[BulkItem], retry_on_conflict: u32) -> Result<String, StoreError> {
    let mut out = String::new();
    for item in items {
        let action = json!({ "update": { "_id": item.id, "retry_on_conflict": retry_on_conflict } });
        let doc = json!({ "doc": item.payload.as_map() });
        out.push_str(
            &serde_json::to_string(&action).map_err(|e| StoreError::Decode(e.to_string()))?,
        );
        out.push('\n');
        out.push_str(&serde_json::to_string(&doc).map_err(|e| StoreError::Decode(e.to_string()))?);
        out.push('\n');
    }
    Ok(out)
}

/// Splits a `_bulk` response into per-item results, in request order.
fn parse_bulk_response(
    body: &Value,
    items: &[BulkItem],
) -> Result<Vec<Result<(), StoreError>>, StoreError> {
    let results = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::Decode("_bulk response has no items".into()))?;

    if results.len() != items.len() {
        return Err(StoreError::Decode(format!(
            "_bulk answered {} items for {} actions",
            results.len(),
            items.len()
        )));
    }

    let out = results
        .iter()
        .zip(items)
        .map(|(r, item)| {
            let action = r.get("update").unwrap_or(r);
            let status = action
                .get("status")
                .and_then(Value::as_u64)
                .unwrap_or(500) as u16;
            if (200..300).contains(&status) {
                Ok(())
            } else {
                let reason = action
                    .get("error")
                    .map(|e| {
                        e.get("reason")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .unwrap_or_default();
                warn!(id = %item.id, status, %reason, "bulk item failed");
                Err(StoreError::HttpStatus {
                    status,
                    url: format!("_bulk#{}", item.id),
                    snippet: reason,
                })
            }
        })
        .collect();

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldSpec;

    fn store() -> ElasticStore {
        ElasticStore::new(&ElasticConfig::new("http://localhost:9200/")).unwrap()
    }

    fn item(id: &str) -> BulkItem {
        let mut payload = UpdatePayload::new();
        payload.insert_encoded(&FieldSpec::new("Summary"), vec![1.0], "t".into());
        BulkItem {
            id: id.into(),
            payload,
        }
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(ElasticStore::new(&ElasticConfig::new("ftp://es")).is_err());
        assert!(ElasticStore::new(&ElasticConfig::new("not a url")).is_err());
    }

    #[test]
    fn endpoint_encodes_ids() {
        let url = store().endpoint(&["trials", "_update", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/trials/_update/a%2Fb%20c");
    }

    #[test]
    fn scroll_body_filters_source() {
        let req = ScanRequest {
            collection: "trials".into(),
            page_size: 100,
            keep_alive: "5m".into(),
            source_fields: vec!["Summary".into(), "Summary_Text".into()],
        };
        let body = open_scroll_body(&req);
        assert_eq!(body["size"], 100);
        assert_eq!(body["sort"], json!(["_doc"]));
        assert_eq!(body["_source"], json!(["Summary", "Summary_Text"]));
    }

    #[test]
    fn parses_scroll_page() {
        let body = json!({
            "_scroll_id": "c1",
            "hits": { "hits": [
                { "_id": "1", "_source": { "Summary": "a" } },
                { "_id": "2" }
            ]}
        });
        let page = parse_scroll_page(&body).unwrap();
        assert_eq!(page.cursor.as_deref(), Some("c1"));
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.documents[0].get("Summary"), Some(&json!("a")));
        assert!(page.documents[1].source.is_empty());

        let bad = json!({ "hits": { "hits": [ { "_source": {} } ] } });
        assert!(parse_scroll_page(&bad).is_err());
    }

    #[test]
    fn merges_mapping_across_indices() {
        let body = json!({
            "trials-v1": { "mappings": { "properties": {
                "Summary": { "type": "text" },
                "Summary_Text": { "type": "text" }
            }}},
            "trials-v2": { "mappings": {} }
        });
        let props = parse_mapping_properties(&body).unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props["Summary_Text"]["type"], "text");
    }

    #[test]
    fn bulk_body_is_ndjson_pairs() {
        let body = bulk_body(&[item("1"), item("2")], 3).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action, json!({"update": {"_id": "1", "retry_on_conflict": 3}}));
        let doc: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(doc["doc"]["Summary_Text"], "t");
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn bulk_response_maps_item_failures() {
        let items = [item("1"), item("2")];
        let body = json!({
            "errors": true,
            "items": [
                { "update": { "_id": "1", "status": 200 } },
                { "update": { "_id": "2", "status": 409,
                  "error": { "type": "version_conflict_engine_exception", "reason": "conflict" } } }
            ]
        });
        let results = parse_bulk_response(&body, &items).unwrap();
        assert!(results[0].is_ok());
        match &results[1] {
            Err(e) => {
                assert_eq!(e.status(), Some(409));
                assert!(e.is_retryable());
            }
            Ok(()) => panic!("second item should fail"),
        }

        let short = json!({ "items": [ { "update": { "status": 200 } } ] });
        assert!(parse_bulk_response(&short, &items).is_err());
    }
}
