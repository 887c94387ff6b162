//! Document, field and payload models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Dense vector produced by the encoder.
pub type Embedding = Vec<f32>;

/// Suffix of the synthesized vector sub-field.
pub const EMBEDDING_SUFFIX: &str = "_Embedding";
/// Suffix of the synthesized text snapshot sub-field.
pub const TEXT_SUFFIX: &str = "_Text";
/// Key of the nested text representation inside an object-valued field.
pub const TEXTBLOCK_KEY: &str = "Textblock";

/// In-flight copy of a stored document.
///
/// Only ever read by the pipeline; changes go through partial updates.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Store-assigned identifier, unique within the collection.
    pub id: String,
    /// Field name → value, as returned in `_source`.
    pub source: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, source: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    /// Builds a document from a JSON object; non-objects give an empty source.
    pub fn from_json(id: impl Into<String>, source: Value) -> Self {
        let source = match source {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        Self::new(id, source)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.source.get(field)
    }
}

/// A field configured for encoding, e.g. `Summary`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSpec {
    name: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<field>_Embedding`
    pub fn embedding_key(&self) -> String {
        format!("{}{EMBEDDING_SUFFIX}", self.name)
    }

    /// `<field>_Text`
    pub fn text_key(&self) -> String {
        format!("{}{TEXT_SUFFIX}", self.name)
    }
}

impl From<&str> for FieldSpec {
    fn from(s: &str) -> Self {
        FieldSpec::new(s)
    }
}

/// Partial update for one document: synthesized field → new value.
///
/// Holds only `<field>_Embedding` / `<field>_Text` pairs; merging it never
/// touches other fields of the stored document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdatePayload {
    fields: Map<String, Value>,
}

impl UpdatePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the vector and the normalized text for `field`.
    pub fn insert_encoded(&mut self, field: &FieldSpec, vector: Embedding, text: String) {
        let vector = vector.into_iter().map(Value::from).collect::<Vec<_>>();
        self.fields
            .insert(field.embedding_key(), Value::Array(vector));
        self.fields.insert(field.text_key(), Value::String(text));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of encoded fields (each contributes a vector/text pair).
    pub fn encoded_fields(&self) -> usize {
        self.fields.len() / 2
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The `doc` body of a partial update.
    pub fn to_doc(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
