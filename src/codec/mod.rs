//! Conversion between BSON documents and JSON text.
//!
//! Documents leave the crate as MongoDB extended JSON, either compact (one
//! line, used for export files) or pretty-printed (used for editing). Text
//! entering the crate may be standard JSON, extended JSON (`{"$oid": ...}`),
//! or the shell dialect with constructors such as `ObjectId("...")` and
//! `ISODate("...")`, which are rewritten by [`shell`] before parsing.
//!
//! Character encodings for files live in [`charset`].

pub mod charset;
pub mod shell;

pub use charset::{CharacterEncoding, LineDecoder};

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ParseError, ParseErrorKind};

/// Which extended JSON flavour is produced when serializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonMode {
    /// Native JSON for 32-bit integers and doubles, `{"$numberLong": ...}` for
    /// 64-bit integers and `{"$oid": ...}` for identifiers.
    #[default]
    Relaxed,

    /// Every number wrapped with its BSON type (`{"$numberInt": "1"}`).
    Canonical,
}

/// Converts documents to and from JSON text.
#[derive(Debug, Clone)]
pub struct DocumentCodec {
    mode: JsonMode,
    indent: usize,
}

impl Default for DocumentCodec {
    fn default() -> Self {
        Self::new(JsonMode::Relaxed, 2)
    }
}

impl DocumentCodec {
    /// Create a codec producing `mode` JSON, indenting pretty output by `indent` spaces.
    pub fn new(mode: JsonMode, indent: usize) -> Self {
        Self { mode, indent }
    }

    pub fn mode(&self) -> JsonMode {
        self.mode
    }

    /// Serialize a document on a single line.
    ///
    /// Control characters inside strings are escaped, so the output never
    /// contains a raw newline and is safe to write as one line of a file.
    pub fn to_compact(&self, doc: &Document) -> Result<String, ParseError> {
        self.value_to_compact(&Bson::Document(doc.clone()))
    }

    /// Serialize any BSON value on a single line.
    pub fn value_to_compact(&self, value: &Bson) -> Result<String, ParseError> {
        serde_json::to_string(&self.to_json(value))
            .map_err(|e| ParseError::invalid_json(e.to_string()))
    }

    /// Serialize a document with indentation, for display and editing.
    pub fn to_pretty(&self, doc: &Document) -> Result<String, ParseError> {
        self.pretty_json(&self.to_json(&Bson::Document(doc.clone())))
    }

    /// Text to seed an editor with: the pretty document, or `{}` when unset.
    pub fn editable_text(&self, doc: Option<&Document>) -> Result<String, ParseError> {
        match doc {
            Some(doc) => self.to_pretty(doc),
            None => Ok("{}".to_string()),
        }
    }

    /// Re-indent any JSON (or shell dialect) text.
    pub fn prettify(&self, text: &str) -> Result<String, ParseError> {
        let value = self.parse_value(text)?;
        self.pretty_json(&self.to_json(&value))
    }

    /// Parse text whose top level must be a JSON object.
    pub fn parse_document(&self, text: &str) -> Result<Document, ParseError> {
        match self.parse_value(text)? {
            Bson::Document(doc) => Ok(doc),
            other => Err(ParseError::not_a_document(bson_type_name(&other))),
        }
    }

    /// Parse optional filter text: blank text means "unset".
    pub fn parse_optional(&self, text: &str) -> Result<Option<Document>, ParseError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.parse_document(text).map(Some)
    }

    /// Parse any JSON value, accepting extended JSON and shell constructors.
    pub fn parse_value(&self, text: &str) -> Result<Bson, ParseError> {
        let normalized = shell::normalize(text)?;
        let json: JsonValue = serde_json::from_str(&normalized)
            .map_err(|e| ParseError::invalid_json(e.to_string()))?;
        Bson::try_from(json)
            .map_err(|e| ParseError::new(ParseErrorKind::InvalidExtendedJson, e.to_string()))
    }

    fn to_json(&self, value: &Bson) -> JsonValue {
        match self.mode {
            JsonMode::Relaxed => relaxed_json(value),
            JsonMode::Canonical => value.clone().into_canonical_extjson(),
        }
    }

    fn pretty_json(&self, value: &JsonValue) -> Result<String, ParseError> {
        let mut buf = Vec::new();
        let indent = " ".repeat(self.indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value
            .serialize(&mut ser)
            .map_err(|e| ParseError::invalid_json(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| ParseError::invalid_json(e.to_string()))
    }
}

/// Relaxed extended JSON with every `Int64` kept as `{"$numberLong": ...}`,
/// so it parses back as `Int64` rather than `Int32`.
fn relaxed_json(value: &Bson) -> JsonValue {
    match value {
        Bson::Int64(n) => serde_json::json!({ "$numberLong": n.to_string() }),
        Bson::Document(doc) => JsonValue::Object(
            doc.iter()
                .map(|(key, field)| (key.clone(), relaxed_json(field)))
                .collect(),
        ),
        Bson::Array(items) => JsonValue::Array(items.iter().map(relaxed_json).collect()),
        other => other.clone().into_relaxed_extjson(),
    }
}

/// Short type label used in "expected a document" messages.
pub(crate) fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Null => "null",
        Bson::Boolean(_) => "boolean",
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => "number",
        Bson::String(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        _ => "scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{DateTime, doc, oid::ObjectId};

    #[test]
    fn test_compact_is_single_line() {
        let codec = DocumentCodec::default();
        let doc = doc! { "note": "first line\nsecond line\r\n\ttabbed", "n": 1 };
        let line = codec.to_compact(&doc).unwrap();
        assert!(!line.contains('\n'));
        assert!(!line.contains('\r'));
        assert!(line.contains("\\n"));
        assert_eq!(codec.parse_document(&line).unwrap(), doc);
    }

    #[test]
    fn test_compact_keeps_field_order() {
        let codec = DocumentCodec::default();
        let doc = doc! { "z": 1, "a": 2, "m": 3 };
        assert_eq!(codec.to_compact(&doc).unwrap(), r#"{"z":1,"a":2,"m":3}"#);
    }

    #[test]
    fn test_object_id_round_trip() {
        let codec = DocumentCodec::default();
        let oid = ObjectId::parse_str("65705d84dfc3f3b5094e1f72").unwrap();
        let doc = doc! { "_id": oid, "created": DateTime::from_millis(1701862788373) };
        let text = codec.to_compact(&doc).unwrap();
        assert!(text.contains(r#"{"$oid":"65705d84dfc3f3b5094e1f72"}"#));
        assert_eq!(codec.parse_document(&text).unwrap(), doc);
    }

    #[test]
    fn test_canonical_mode_wraps_numbers() {
        let codec = DocumentCodec::new(JsonMode::Canonical, 2);
        let text = codec.to_compact(&doc! { "n": 5_i64 }).unwrap();
        assert_eq!(text, r#"{"n":{"$numberLong":"5"}}"#);
        assert_eq!(codec.parse_document(&text).unwrap(), doc! { "n": 5_i64 });
    }

    #[test]
    fn test_relaxed_mode_keeps_int64_typed() {
        let codec = DocumentCodec::default();
        let doc = doc! {
            "small": 5_i64,
            "big": 1_i64 << 40,
            "plain": 5,
            "nested": { "list": [1_i64, 2] },
        };
        let text = codec.to_compact(&doc).unwrap();
        assert_eq!(
            text,
            r#"{"small":{"$numberLong":"5"},"big":{"$numberLong":"1099511627776"},"plain":5,"nested":{"list":[{"$numberLong":"1"},2]}}"#
        );
        assert_eq!(codec.parse_document(&text).unwrap(), doc);
    }

    #[test]
    fn test_pretty_uses_indent() {
        let codec = DocumentCodec::new(JsonMode::Relaxed, 4);
        let text = codec.to_pretty(&doc! { "a": { "b": 1 } }).unwrap();
        assert!(text.contains("\n    \"a\": {\n        \"b\": 1"));
    }

    #[test]
    fn test_parse_document_rejects_non_objects() {
        let codec = DocumentCodec::default();
        let err = codec.parse_document("[1, 2]").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NotADocument);
        let err = codec.parse_document("42").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NotADocument);
    }

    #[test]
    fn test_parse_invalid_json() {
        let codec = DocumentCodec::default();
        let err = codec.parse_document(r#"{"a": }"#).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidJson);
    }

    #[test]
    fn test_parse_invalid_extended_json() {
        let codec = DocumentCodec::default();
        let err = codec.parse_document(r#"{"_id": {"$oid": "nothex"}}"#).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidExtendedJson);
    }

    #[test]
    fn test_parse_optional_blank_is_unset() {
        let codec = DocumentCodec::default();
        assert_eq!(codec.parse_optional("   \n").unwrap(), None);
        assert_eq!(codec.parse_optional("{}").unwrap(), Some(Document::new()));
    }

    #[test]
    fn test_parse_shell_dialect() {
        let codec = DocumentCodec::default();
        let doc = codec
            .parse_document(r#"{ _id: ObjectId('65705d84dfc3f3b5094e1f72'), n: NumberLong(7) }"#)
            .unwrap();
        assert_eq!(
            doc.get_object_id("_id").unwrap().to_hex(),
            "65705d84dfc3f3b5094e1f72"
        );
        assert_eq!(doc.get_i64("n").unwrap(), 7);
    }

    #[test]
    fn test_editable_text_for_unset_document() {
        let codec = DocumentCodec::default();
        assert_eq!(codec.editable_text(None).unwrap(), "{}");
        assert!(codec.editable_text(Some(&doc! { "a": 1 })).unwrap().contains("\"a\": 1"));
    }

    #[test]
    fn test_prettify() {
        let codec = DocumentCodec::default();
        assert_eq!(codec.prettify(r#"{"a":[1,2]}"#).unwrap(), "{\n  \"a\": [\n    1,\n    2\n  ]\n}");
    }
}
