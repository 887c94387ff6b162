//! Mapping manager: declares `<field>_Embedding` / `<field>_Text` sub-fields.
//!
//! Idempotent: the current mapping is read first and only missing
//! declarations are written. Compatible existing declarations are left alone,
//! incompatible ones abort the run.

use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};

use crate::document::FieldSpec;
use crate::errors::SchemaError;
use crate::store::RemoteStore;

/// What [`extend_schema`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaOutcome {
    /// Sub-fields declared by this call.
    pub added: Vec<String>,
    /// Sub-fields that were already declared compatibly.
    pub already_present: Vec<String>,
}

impl SchemaOutcome {
    /// `true` when no mapping write was needed.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
    }
}

/// `dense_vector` declaration for a vector sub-field.
pub fn vector_property(dim: usize) -> Value {
    json!({ "type": "dense_vector", "dims": dim })
}

/// `text` declaration for a text snapshot sub-field.
pub fn text_property() -> Value {
    json!({ "type": "text" })
}

/// Desired declarations for every configured field, in field order.
pub fn desired_properties(fields: &[FieldSpec], dim: usize) -> Vec<(String, Value)> {
    fields
        .iter()
        .flat_map(|f| {
            [
                (f.embedding_key(), vector_property(dim)),
                (f.text_key(), text_property()),
            ]
        })
        .collect()
}

/// Ensures every synthesized sub-field is declared in `collection`.
///
/// # Errors
/// - [`SchemaError::Lookup`] when the current mapping cannot be read
/// - [`SchemaError::Conflict`] when a sub-field exists with another type or `dims`
/// - [`SchemaError::Rejected`] when the store refuses the delta
#[instrument(level = "info", skip_all, fields(collection = %collection, fields = fields.len(), dim = dim))]
pub async fn extend_schema(
    store: &dyn RemoteStore,
    collection: &str,
    fields: &[FieldSpec],
    dim: usize,
) -> Result<SchemaOutcome, SchemaError> {
    let current = store
        .get_mapping(collection)
        .await
        .map_err(|source| SchemaError::Lookup {
            collection: collection.to_string(),
            source,
        })?;

    let mut outcome = SchemaOutcome::default();
    let mut delta = Map::new();

    for (name, wanted) in desired_properties(fields, dim) {
        match current.get(&name) {
            Some(existing) if compatible(existing, &wanted) => {
                outcome.already_present.push(name);
            }
            Some(existing) => {
                return Err(SchemaError::Conflict {
                    field: name,
                    existing: describe(existing),
                    wanted: describe(&wanted),
                });
            }
            None => {
                outcome.added.push(name.clone());
                delta.insert(name, wanted);
            }
        }
    }

    if delta.is_empty() {
        debug!(present = outcome.already_present.len(), "mapping already complete");
        return Ok(outcome);
    }

    store
        .put_mapping(collection, &delta)
        .await
        .map_err(|source| SchemaError::Rejected {
            collection: collection.to_string(),
            source,
        })?;

    info!(
        added = outcome.added.len(),
        present = outcome.already_present.len(),
        "mapping extended"
    );
    Ok(outcome)
}

/// Same `type`, and same `dims` for vectors.
fn compatible(existing: &Value, wanted: &Value) -> bool {
    existing.get("type") == wanted.get("type")
        && (wanted.get("dims").is_none() || existing.get("dims") == wanted.get("dims"))
}

fn describe(prop: &Value) -> String {
    let ty = prop.get("type").and_then(Value::as_str).unwrap_or("object");
    match prop.get("dims") {
        Some(d) => format!("{ty}(dims={d})"),
        None => ty.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::new("Summary"), FieldSpec::new("Title")]
    }

    #[tokio::test]
    async fn second_call_writes_nothing() {
        let store = MemoryStore::new();
        store.create_collection("c");

        let first = extend_schema(&store, "c", &fields(), 4).await.unwrap();
        assert_eq!(first.added.len(), 4);
        assert_eq!(store.mapping_puts(), 1);

        let second = extend_schema(&store, "c", &fields(), 4).await.unwrap();
        assert!(second.is_noop());
        assert_eq!(second.already_present.len(), 4);
        assert_eq!(store.mapping_puts(), 1);

        let props = store.properties("c").unwrap();
        assert_eq!(props["Summary_Embedding"], vector_property(4));
        assert_eq!(props["Title_Text"], text_property());
    }

    #[tokio::test]
    async fn only_missing_fields_are_added() {
        let store = MemoryStore::new();
        store.create_collection("c");
        extend_schema(&store, "c", &fields()[..1], 4).await.unwrap();

        let out = extend_schema(&store, "c", &fields(), 4).await.unwrap();
        assert_eq!(out.added, vec!["Title_Embedding", "Title_Text"]);
        assert_eq!(out.already_present, vec!["Summary_Embedding", "Summary_Text"]);
    }

    #[tokio::test]
    async fn dimension_change_is_a_conflict() {
        let store = MemoryStore::new();
        store.create_collection("c");
        extend_schema(&store, "c", &fields(), 4).await.unwrap();

        let err = extend_schema(&store, "c", &fields(), 8).await.unwrap_err();
        match err {
            SchemaError::Conflict { field, existing, wanted } => {
                assert_eq!(field, "Summary_Embedding");
                assert_eq!(existing, "dense_vector(dims=4)");
                assert_eq!(wanted, "dense_vector(dims=8)");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.mapping_puts(), 1);
    }

    #[tokio::test]
    async fn missing_collection_is_lookup_error() {
        let store = MemoryStore::new();
        let err = extend_schema(&store, "nope", &fields(), 4).await.unwrap_err();
        assert!(matches!(err, SchemaError::Lookup { .. }));
    }
}
