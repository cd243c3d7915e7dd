//! Natural key → stored row.
//!
//! Callers address everything by natural key. Writes resolve the key to the
//! row first and then act on its internal identifier, so no statement ever
//! matches on a key that could hit more than one row.

use dictstore_core::{
  collection::CollectionSpec, dictionary::DictionaryKey, query::Filter,
};
use rusqlite::Connection;

use crate::{
  encode::{DICTIONARY_COLUMNS, RECORD_COLUMNS, RawDictionary, RawRecord},
  query::{Select, Target},
};

/// The rows of `spec` within `owner`. Independent collections ignore the
/// owner columns entirely.
pub fn scoped(spec: &CollectionSpec, owner: Option<&DictionaryKey>) -> Select {
  let select = Select::new(spec.collection);
  match owner {
    Some(key) if spec.is_dependent() => select
      .eq("dictionary_type", key.dictionary_type.as_str().to_owned())
      .eq("dictionary_version", key.dictionary_version.clone()),
    _ => select,
  }
}

pub fn dictionary(
  conn: &Connection,
  key: &DictionaryKey,
) -> rusqlite::Result<Option<RawDictionary>> {
  Select::new("dictionaries")
    .eq("dictionary_type", key.dictionary_type.as_str().to_owned())
    .eq("dictionary_version", key.dictionary_version.clone())
    .first(conn, DICTIONARY_COLUMNS, RawDictionary::from_row)
}

pub fn dictionary_by_id(
  conn: &Connection,
  dictionary_id: &str,
) -> rusqlite::Result<Option<RawDictionary>> {
  Select::new("dictionaries")
    .eq("dictionary_id", dictionary_id.to_owned())
    .first(conn, DICTIONARY_COLUMNS, RawDictionary::from_row)
}

pub fn record(
  conn: &Connection,
  spec: &CollectionSpec,
  owner: Option<&DictionaryKey>,
  key: &str,
) -> rusqlite::Result<Option<RawRecord>> {
  scoped(spec, owner)
    .filter(Target::Json(spec.lookup_field), &Filter::exact(spec.lookup_field, key))
    .first(conn, RECORD_COLUMNS, RawRecord::from_row)
}

pub fn record_by_id(
  conn: &Connection,
  spec: &CollectionSpec,
  record_id: &str,
) -> rusqlite::Result<Option<RawRecord>> {
  Select::new(spec.collection)
    .eq("record_id", record_id.to_owned())
    .first(conn, RECORD_COLUMNS, RawRecord::from_row)
}
