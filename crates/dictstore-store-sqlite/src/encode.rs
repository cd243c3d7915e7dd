//! Encoding and decoding helpers between domain types and the values stored
//! in SQLite.
//!
//! Timestamps are stored as RFC 3339 strings with fixed microsecond precision
//! so that text order matches time order. UUIDs are stored as hyphenated
//! lowercase strings. Content bodies are stored as compact JSON text.

use chrono::{DateTime, SecondsFormat, Utc};
use dictstore_core::{
  collection::ContentKind,
  content::{ContentRecord, Document},
  dictionary::{DictionaryKey, DictionaryState, DictionaryType, DictionaryVersion},
  query::FilterValue,
};
use rusqlite::{Row, types::Value as SqlValue};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Scalars ─────────────────────────────────────────────────────────────────

/// The SQL value a JSON scalar is compared as. `json_extract` yields the same
/// representation, so equality holds across the boundary.
pub fn json_to_sql(value: &Value) -> Option<SqlValue> {
  match value {
    Value::String(s) => Some(SqlValue::Text(s.clone())),
    Value::Number(n) => n
      .as_i64()
      .map(SqlValue::Integer)
      .or_else(|| n.as_f64().map(SqlValue::Real)),
    Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
    Value::Null | Value::Array(_) | Value::Object(_) => None,
  }
}

/// Render a value read back from SQLite as key text.
pub fn sql_to_text(value: SqlValue) -> Option<String> {
  match value {
    SqlValue::Text(s) => Some(s),
    SqlValue::Integer(n) => Some(n.to_string()),
    SqlValue::Real(f) => Some(f.to_string()),
    SqlValue::Null | SqlValue::Blob(_) => None,
  }
}

pub fn filter_to_sql(value: &FilterValue) -> SqlValue {
  match value {
    FilterValue::Text(s) => SqlValue::Text(s.clone()),
    FilterValue::Integer(n) => SqlValue::Integer(*n),
  }
}

pub fn encode_body(body: &Document) -> Result<String> {
  Ok(serde_json::to_string(body)?)
}

// ─── Dictionary rows ─────────────────────────────────────────────────────────

pub const DICTIONARY_COLUMNS: &str = "dictionary_id, dictionary_type, \
                                      dictionary_version, \
                                      dictionary_description, state, \
                                      creation_date";

/// Raw strings read directly from a `dictionaries` row.
pub struct RawDictionary {
  pub dictionary_id:      String,
  pub dictionary_type:    String,
  pub dictionary_version: String,
  pub description:        String,
  pub state:              String,
  pub creation_date:      String,
}

impl RawDictionary {
  /// Read a row selected with [`DICTIONARY_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      dictionary_id:      row.get(0)?,
      dictionary_type:    row.get(1)?,
      dictionary_version: row.get(2)?,
      description:        row.get(3)?,
      state:              row.get(4)?,
      creation_date:      row.get(5)?,
    })
  }

  pub fn into_dictionary(self) -> Result<DictionaryVersion> {
    Ok(DictionaryVersion {
      dictionary_id:      decode_uuid(&self.dictionary_id)?,
      dictionary_type:    self.dictionary_type.parse::<DictionaryType>()?,
      dictionary_version: self.dictionary_version,
      description:        self.description,
      state:              self.state.parse::<DictionaryState>()?,
      creation_date:      decode_dt(&self.creation_date)?,
    })
  }
}

// ─── Content rows ────────────────────────────────────────────────────────────

pub const RECORD_COLUMNS: &str =
  "record_id, dictionary_type, dictionary_version, created_at, body";

/// Raw strings read directly from a collection row.
pub struct RawRecord {
  pub record_id:          String,
  pub dictionary_type:    Option<String>,
  pub dictionary_version: Option<String>,
  pub created_at:         String,
  pub body:               String,
}

impl RawRecord {
  /// Read a row selected with [`RECORD_COLUMNS`].
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:          row.get(0)?,
      dictionary_type:    row.get(1)?,
      dictionary_version: row.get(2)?,
      created_at:         row.get(3)?,
      body:               row.get(4)?,
    })
  }

  pub fn into_record(self, kind: ContentKind) -> Result<ContentRecord> {
    let owner = match (self.dictionary_type, self.dictionary_version) {
      (Some(t), Some(v)) => Some(DictionaryKey::new(t.parse()?, v)),
      _ => None,
    };

    Ok(ContentRecord {
      record_id: decode_uuid(&self.record_id)?,
      kind,
      owner,
      created_at: decode_dt(&self.created_at)?,
      body: serde_json::from_str(&self.body)?,
    })
  }
}

/// Owner columns for an insert: both `NULL` for independent collections.
pub fn encode_owner(
  owner: Option<&DictionaryKey>,
) -> (Option<&'static str>, Option<String>) {
  match owner {
    Some(key) => {
      (Some(key.dictionary_type.as_str()), Some(key.dictionary_version.clone()))
    }
    None => (None, None),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn timestamps_sort_as_text() {
    let early = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
      .unwrap()
      .with_timezone(&Utc);
    let late = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.5Z")
      .unwrap()
      .with_timezone(&Utc);
    assert!(encode_dt(early) < encode_dt(late));
    assert_eq!(decode_dt(&encode_dt(late)).unwrap(), late);
  }

  #[test]
  fn json_scalars_map_to_sql() {
    assert_eq!(json_to_sql(&json!("a")), Some(SqlValue::Text("a".into())));
    assert_eq!(json_to_sql(&json!(12)), Some(SqlValue::Integer(12)));
    assert_eq!(json_to_sql(&json!(true)), Some(SqlValue::Integer(1)));
    assert_eq!(json_to_sql(&json!(null)), None);
    assert_eq!(json_to_sql(&json!([1])), None);
  }

  #[test]
  fn sql_values_render_as_text() {
    assert_eq!(sql_to_text(SqlValue::Integer(7)).as_deref(), Some("7"));
    assert_eq!(sql_to_text(SqlValue::Null), None);
  }

  #[test]
  fn raw_record_without_owner_is_global() {
    let raw = RawRecord {
      record_id:          encode_uuid(Uuid::nil()),
      dictionary_type:    None,
      dictionary_version: None,
      created_at:         "2024-01-01T00:00:00.000000Z".into(),
      body:               r#"{"vi_id":"VI-1"}"#.into(),
    };
    let record = raw.into_record(ContentKind::VerificationItem).unwrap();
    assert!(record.owner.is_none());
    assert_eq!(record.body["vi_id"], "VI-1");
  }
}
