//! Natural-key uniqueness checks that run before a write.
//!
//! The unique indexes in the schema are the last line; these checks exist so
//! a rejected batch names every colliding value instead of the first one the
//! index tripped on. Both run inside the same connection call as the write
//! they guard.

use std::collections::BTreeSet;

use dictstore_core::{
  collection::CollectionSpec,
  content::{Document, key_text},
  dictionary::DictionaryKey,
  store::{Conflict, KeyCollision},
};
use rusqlite::{Connection, types::Value as SqlValue};

use crate::{
  encode::{json_to_sql, sql_to_text},
  query::Target,
  resolve::scoped,
};

/// Values per `IN (...)` list; keeps statements under SQLite's parameter cap.
const CHUNK: usize = 500;

/// Key values carried by `docs` that a stored record in scope already holds.
/// `exclude` names a record whose own values do not count.
pub fn existing_collisions(
  conn: &Connection,
  spec: &CollectionSpec,
  owner: Option<&DictionaryKey>,
  docs: &[Document],
  exclude: Option<&str>,
) -> rusqlite::Result<Vec<KeyCollision>> {
  let mut collisions = Vec::new();

  for &field in spec.unique_fields {
    let values: Vec<SqlValue> = docs
      .iter()
      .filter_map(|doc| doc.get(field).and_then(json_to_sql))
      .collect();

    let mut taken = BTreeSet::new();
    for chunk in values.chunks(CHUNK) {
      let mut select =
        scoped(spec, owner).one_of(Target::Json(field), chunk.to_vec());
      if let Some(record_id) = exclude {
        select = select.ne("record_id", record_id.to_owned());
      }
      taken.extend(
        select
          .distinct(conn, Target::Json(field))?
          .into_iter()
          .filter_map(sql_to_text),
      );
    }

    collisions.extend(
      taken.into_iter().map(|value| KeyCollision::existing(field, value)),
    );
  }

  Ok(collisions)
}

/// Full check for a batch insert: values repeated inside the batch plus
/// values already stored. `None` means the batch may be written.
pub fn check_batch(
  conn: &Connection,
  spec: &CollectionSpec,
  owner: Option<&DictionaryKey>,
  docs: &[Document],
) -> rusqlite::Result<Option<Conflict>> {
  let mut collisions = existing_collisions(conn, spec, owner, docs, None)?;
  collisions.extend(spec.batch_collisions(docs));

  Ok((!collisions.is_empty()).then(|| Conflict::new(collisions)))
}

/// The unique fields a patch would change, as a one-document batch ready
/// for [`existing_collisions`].
pub fn changed_keys(
  spec: &CollectionSpec,
  current: &Document,
  patch: &Document,
) -> Document {
  spec
    .unique_fields
    .iter()
    .filter_map(|field| {
      let next = patch.get(*field)?;
      let changed = key_text(next) != current.get(*field).and_then(key_text);
      (changed && key_text(next).is_some())
        .then(|| ((*field).to_owned(), next.clone()))
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use dictstore_core::collection::{CHANNEL, COMMAND};
  use serde_json::json;

  use super::*;

  fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap()
  }

  #[test]
  fn only_changed_unique_fields_are_rechecked() {
    let current = doc(json!({ "channel_id": "A-1", "channel_name": "TEMP" }));
    let patch = doc(json!({
      "channel_id": "A-1",
      "channel_name": "PRESSURE",
      "description": "renamed",
    }));
    let changed = changed_keys(&CHANNEL, &current, &patch);
    assert_eq!(changed, doc(json!({ "channel_name": "PRESSURE" })));
  }

  #[test]
  fn removing_an_optional_key_is_not_a_collision() {
    let current = doc(json!({ "channel_id": "A-1", "channel_name": "TEMP" }));
    let patch = doc(json!({ "channel_id": null }));
    assert!(changed_keys(&CHANNEL, &current, &patch).is_empty());
  }

  #[test]
  fn untouched_key_is_not_rechecked() {
    let current = doc(json!({ "command_stem": "PWR_ON" }));
    let patch = doc(json!({ "cmd_type": "FSW" }));
    assert!(changed_keys(&COMMAND, &current, &patch).is_empty());
  }
}
