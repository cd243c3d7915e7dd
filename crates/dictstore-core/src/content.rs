//! Content records: commands, channels, EVRs, bus variables, verification
//! items and custom scripts.
//!
//! Content is schemaless beyond the fields its [`CollectionSpec`] declares:
//! the body is stored as a JSON document and only key, filter and sort fields
//! are interpreted by the store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
  Error, Result,
  collection::{CollectionSpec, ContentKind},
  dictionary::DictionaryKey,
};

/// A JSON object body.
pub type Document = serde_json::Map<String, Value>;

/// Fields the store owns. Values supplied by callers are discarded.
pub const RESERVED_FIELDS: &[&str] =
  &["record_id", "created_at", "dictionary_type", "dictionary_version"];

/// A stored content record.
///
/// Serialises as one flat object: server metadata, the owner key (for
/// dictionary-owned kinds) and the body fields side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRecord {
  pub record_id:  Uuid,
  #[serde(skip)]
  pub kind:       ContentKind,
  #[serde(flatten)]
  pub owner:      Option<DictionaryKey>,
  /// Server-assigned timestamp; never changes after creation.
  pub created_at: DateTime<Utc>,
  #[serde(flatten)]
  pub body:       Document,
}

impl ContentRecord {
  pub fn field(&self, name: &str) -> Option<&Value> { self.body.get(name) }

  /// The record's natural key as text, if it has one.
  pub fn key(&self, spec: &CollectionSpec) -> Option<String> {
    self.field(spec.lookup_field).and_then(key_text)
  }
}

/// Render a scalar key value as text. Non-scalar and null values have no key.
pub fn key_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Null | Value::Array(_) | Value::Object(_) => None,
  }
}

/// Drop every reserved field from a body or patch.
pub fn strip_reserved(doc: &mut Document) {
  for field in RESERVED_FIELDS {
    doc.remove(*field);
  }
}

/// Validate a batch of raw candidates for `spec`.
///
/// Each candidate must be a JSON object carrying a non-empty string lookup
/// key. Reserved fields are removed; the store stamps its own.
pub fn into_documents(
  spec: &CollectionSpec,
  candidates: Vec<Value>,
) -> Result<Vec<Document>> {
  candidates
    .into_iter()
    .enumerate()
    .map(|(index, candidate)| {
      let Value::Object(mut doc) = candidate else {
        return Err(Error::NotAnObject { index });
      };
      strip_reserved(&mut doc);
      match doc.get(spec.lookup_field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(doc),
        _ => Err(Error::MissingKey { index, field: spec.lookup_field }),
      }
    })
    .collect()
}
