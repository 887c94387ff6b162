//! Field extraction: which text, if any, a document contributes for a field.

use serde_json::Value;

use crate::document::{Document, FieldSpec, TEXTBLOCK_KEY};
use crate::normalize::normalize_whitespace;

/// Resolves the text to encode for `field`, or `None` when nothing should be
/// encoded.
///
/// `None` when:
/// - the field is missing,
/// - `<field>_Text` already holds a non-empty value (document was augmented),
/// - the value is neither a string nor an object with a string `Textblock`,
/// - the text is blank after whitespace normalization.
pub fn extract(doc: &Document, field: &FieldSpec) -> Option<String> {
    let value = doc.get(field.name())?;

    if doc.get(&field.text_key()).is_some_and(is_populated) {
        return None;
    }

    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(m) => m.get(TEXTBLOCK_KEY)?.as_str()?,
        _ => return None,
    };

    let text = normalize_whitespace(raw);
    (!text.is_empty()).then_some(text)
}

/// Whether a stored `_Text` marker counts as "already augmented".
fn is_populated(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        Document::from_json("d1", v)
    }

    fn summary() -> FieldSpec {
        FieldSpec::new("Summary")
    }

    #[test]
    fn plain_string_is_normalized() {
        let d = doc(json!({"Summary": "  a   b "}));
        assert_eq!(extract(&d, &summary()).as_deref(), Some("a b"));
    }

    #[test]
    fn textblock_is_unwrapped() {
        let d = doc(json!({"Summary": {"Textblock": "x  y"}}));
        assert_eq!(extract(&d, &summary()).as_deref(), Some("x y"));
    }

    #[test]
    fn missing_field_is_absent() {
        assert_eq!(extract(&doc(json!({})), &summary()), None);
    }

    #[test]
    fn already_augmented_is_absent() {
        let d = doc(json!({"Summary": "new text", "Summary_Text": "already"}));
        assert_eq!(extract(&d, &summary()), None);
    }

    #[test]
    fn empty_marker_does_not_block() {
        for marker in [json!(""), json!(0), json!(null), json!(false), json!([])] {
            let d = doc(json!({"Summary": "fresh", "Summary_Text": marker}));
            assert_eq!(extract(&d, &summary()).as_deref(), Some("fresh"));
        }
    }

    #[test]
    fn non_zero_marker_blocks() {
        let d = doc(json!({"Summary": "fresh", "Summary_Text": 1}));
        assert_eq!(extract(&d, &summary()), None);
    }

    #[test]
    fn unusable_shapes_are_absent() {
        for v in [
            json!(42),
            json!(["a", "b"]),
            json!({"Other": "x"}),
            json!({"Textblock": 7}),
            json!("   "),
        ] {
            let d = doc(json!({ "Summary": v }));
            assert_eq!(extract(&d, &summary()), None, "value {v}");
        }
    }

    #[test]
    fn other_fields_do_not_interfere() {
        let d = doc(json!({"Summary": "s", "Title_Text": "done", "Title": "t"}));
        assert_eq!(extract(&d, &summary()).as_deref(), Some("s"));
        assert_eq!(extract(&d, &FieldSpec::new("Title")), None);
    }
}
