//! SQL schema for the dictionary store.
//!
//! The `dictionaries` table is fixed. Collection tables and their unique
//! indexes are generated from the [`CollectionRegistry`], so a collection
//! declared there needs no hand-written DDL.

use dictstore_core::collection::{CollectionRegistry, CollectionSpec};

use crate::{Error, Result};

/// Bumped whenever the generated layout changes.
pub const SCHEMA_VERSION: u32 = 1;

const BASE_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS dictionaries (
    dictionary_id          TEXT PRIMARY KEY,
    dictionary_type        TEXT NOT NULL,   -- 'sse' | 'flight'
    dictionary_version     TEXT NOT NULL,
    dictionary_description TEXT NOT NULL DEFAULT '',
    state                  TEXT NOT NULL DEFAULT 'NOT_PUBLISHED',
    creation_date          TEXT NOT NULL,   -- RFC 3339 UTC; server-assigned
    UNIQUE (dictionary_type, dictionary_version)
);

CREATE INDEX IF NOT EXISTS dictionaries_created_idx
    ON dictionaries(dictionary_type, creation_date);
";

/// DDL for one collection table plus its indexes.
///
/// Dependent collections carry the owner key in two columns; independent
/// ones leave both `NULL`. The unique index is an expression index over the
/// owner columns and the declared key fields of the JSON body.
pub fn collection_ddl(spec: &CollectionSpec) -> String {
  let table = spec.collection;
  let mut ddl = format!(
    "
CREATE TABLE IF NOT EXISTS {table} (
    record_id          TEXT PRIMARY KEY,
    dictionary_type    TEXT,
    dictionary_version TEXT,
    created_at         TEXT NOT NULL,
    body               TEXT NOT NULL CHECK (json_valid(body))
);
"
  );

  let mut key_columns: Vec<String> = Vec::new();
  if spec.is_dependent() {
    ddl.push_str(&format!(
      "CREATE INDEX IF NOT EXISTS {table}_owner_idx \
       ON {table}(dictionary_type, dictionary_version);\n"
    ));
    key_columns.push("dictionary_type".into());
    key_columns.push("dictionary_version".into());
  }
  key_columns.extend(
    spec
      .index_fields
      .iter()
      .map(|field| format!("json_extract(body, '$.{field}')")),
  );
  ddl.push_str(&format!(
    "CREATE UNIQUE INDEX IF NOT EXISTS {table}_key_idx ON {table}({});\n",
    key_columns.join(", ")
  ));

  ddl
}

/// The complete, idempotent schema for `registry`.
pub fn schema(registry: &CollectionRegistry) -> Result<String> {
  validate(registry)?;

  let mut sql = BASE_SCHEMA.to_owned();
  for spec in registry.iter() {
    sql.push_str(&collection_ddl(spec));
  }
  sql.push_str(&format!("\nPRAGMA user_version = {SCHEMA_VERSION};\n"));
  Ok(sql)
}

/// Table and field names are interpolated into SQL, so every declared name
/// must be a plain lowercase identifier.
fn validate(registry: &CollectionRegistry) -> Result<()> {
  for spec in registry.iter() {
    let names = std::iter::once(spec.collection)
      .chain(spec.unique_fields.iter().copied())
      .chain(spec.index_fields.iter().copied())
      .chain(spec.filters.iter().map(|f| f.field))
      .chain([spec.lookup_field, spec.default_sort]);
    for name in names {
      if !is_identifier(name) {
        return Err(Error::InvalidRegistry(format!(
          "{}: {name:?} is not a plain identifier",
          spec.kind
        )));
      }
    }
    if spec.collection == "dictionaries" {
      return Err(Error::InvalidRegistry(format!(
        "{}: collection name is reserved",
        spec.kind
      )));
    }
  }
  Ok(())
}

fn is_identifier(name: &str) -> bool {
  !name.is_empty()
    && !name.starts_with(|c: char| c.is_ascii_digit())
    && name
      .chars()
      .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
