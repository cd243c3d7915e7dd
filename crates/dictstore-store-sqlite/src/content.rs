//! Content collection management, shared by every registered kind.
//!
//! Each operation receives the kind's [`CollectionSpec`] and works within the
//! owner scope it was given: one dictionary version for dependent kinds, the
//! whole table for independent ones.

use std::collections::HashSet;

use chrono::{SubsecRound as _, Utc};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use dictstore_core::{
  collection::CollectionSpec,
  content::{ContentRecord, Document, into_documents, strip_reserved},
  dictionary::DictionaryKey,
  query::{ListQuery, MAX_LIMIT, Page},
  store::{Conflict, WriteOutcome},
};

use crate::{
  Result,
  encode::{
    RECORD_COLUMNS, RawRecord, encode_body, encode_dt, encode_owner,
    encode_uuid,
  },
  guard,
  query::Target,
  resolve::{self, scoped},
  store::SqliteStore,
};

/// Keys per `IN (...)` list in a bulk query.
const KEY_CHUNK: usize = 500;

enum BatchOutcome {
  Inserted(Vec<ContentRecord>),
  MissingOwner,
  Conflict(Conflict),
}

impl SqliteStore {
  /// Validate, check and insert a batch, all or nothing.
  ///
  /// The owner check, the uniqueness check and the insert share one
  /// connection call; the insert itself is a single transaction.
  pub(crate) async fn insert_records(
    &self,
    spec: CollectionSpec,
    owner: Option<&DictionaryKey>,
    candidates: Vec<Value>,
  ) -> Result<WriteOutcome<Vec<ContentRecord>>> {
    let docs = into_documents(&spec, candidates)?;
    let created_at = Utc::now().trunc_subsecs(6);

    let records: Vec<ContentRecord> = docs
      .into_iter()
      .map(|body| ContentRecord {
        record_id: Uuid::new_v4(),
        kind: spec.kind,
        owner: owner.cloned(),
        created_at,
        body,
      })
      .collect();
    let rows = records
      .iter()
      .map(|r| Ok((encode_uuid(r.record_id), encode_body(&r.body)?)))
      .collect::<Result<Vec<_>>>()?;

    let owner_key = owner.cloned();
    let created_str = encode_dt(created_at);

    let outcome = self
      .conn
      .call(move |conn| {
        if let Some(key) = &owner_key
          && resolve::dictionary(conn, key)?.is_none()
        {
          return Ok(BatchOutcome::MissingOwner);
        }

        let bodies: Vec<Document> =
          records.iter().map(|r| r.body.clone()).collect();
        if let Some(conflict) =
          guard::check_batch(conn, &spec, owner_key.as_ref(), &bodies)?
        {
          return Ok(BatchOutcome::Conflict(conflict));
        }

        let (type_col, version_col) = encode_owner(owner_key.as_ref());
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} (
               record_id, dictionary_type, dictionary_version, created_at, body
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
            spec.collection
          ))?;
          for (id, body) in &rows {
            stmt.execute(rusqlite::params![
              id,
              type_col,
              version_col,
              created_str,
              body
            ])?;
          }
        }
        tx.commit()?;
        Ok(BatchOutcome::Inserted(records))
      })
      .await?;

    match outcome {
      BatchOutcome::Inserted(records) => {
        info!(
          kind = %spec.kind,
          owner = ?owner.map(ToString::to_string),
          count = records.len(),
          "content records created"
        );
        Ok(WriteOutcome::Written(records))
      }
      BatchOutcome::MissingOwner => Ok(WriteOutcome::NotFound),
      BatchOutcome::Conflict(conflict) => {
        info!(kind = %spec.kind, %conflict, "batch rejected");
        Ok(WriteOutcome::Conflict(conflict))
      }
    }
  }

  pub(crate) async fn list_records(
    &self,
    spec: CollectionSpec,
    owner: Option<&DictionaryKey>,
    query: &ListQuery,
  ) -> Result<Page<ContentRecord>> {
    let mut select = scoped(&spec, owner);
    for filter in &query.filters {
      select = select.filter(Target::Json(filter.field), filter);
    }

    let sort = Target::Json(spec.sort_field(query.sort_by.as_deref()));
    let direction = query.direction;
    let limit = query.effective_limit();
    let offset = query.offset;

    let (raws, total) = self
      .conn
      .call(move |conn| {
        let total = select.count(conn)?;
        let raws = select.page(
          conn,
          RECORD_COLUMNS,
          sort,
          direction,
          limit,
          offset,
          RawRecord::from_row,
        )?;
        Ok((raws, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(|raw| raw.into_record(spec.kind))
      .collect::<Result<Vec<_>>>()?;
    Ok(Page { items, total })
  }

  /// Every record in scope whose lookup key is one of `keys`. Repeated keys
  /// are looked up once.
  pub(crate) async fn records_by_keys(
    &self,
    spec: CollectionSpec,
    owner: Option<&DictionaryKey>,
    keys: &[String],
  ) -> Result<Vec<ContentRecord>> {
    let limit = MAX_LIMIT as usize;
    if keys.len() > limit {
      return Err(
        dictstore_core::Error::TooManyKeys { count: keys.len(), limit }.into(),
      );
    }

    let mut seen = HashSet::new();
    let keys: Vec<String> = keys
      .iter()
      .filter(|k| seen.insert(k.as_str()))
      .cloned()
      .collect();
    let owner_key = owner.cloned();

    let raws = self
      .conn
      .call(move |conn| {
        let mut raws = Vec::new();
        for chunk in keys.chunks(KEY_CHUNK) {
          let values = chunk.iter().cloned().map(Into::into).collect();
          raws.extend(
            scoped(&spec, owner_key.as_ref())
              .one_of(Target::Json(spec.lookup_field), values)
              .all(conn, RECORD_COLUMNS, RawRecord::from_row)?,
          );
        }
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(|raw| raw.into_record(spec.kind)).collect()
  }

  pub(crate) async fn find_record(
    &self,
    spec: CollectionSpec,
    owner: Option<&DictionaryKey>,
    key: &str,
  ) -> Result<Option<ContentRecord>> {
    let owner_key = owner.cloned();
    let key = key.to_owned();
    let raw = self
      .conn
      .call(move |conn| Ok(resolve::record(conn, &spec, owner_key.as_ref(), &key)?))
      .await?;
    raw.map(|raw| raw.into_record(spec.kind)).transpose()
  }

  /// Merge `patch` into the body of the record addressed by `key`.
  pub(crate) async fn patch_record(
    &self,
    spec: CollectionSpec,
    owner: Option<&DictionaryKey>,
    key: &str,
    mut patch: Document,
  ) -> Result<WriteOutcome<ContentRecord>> {
    let Some(current) = self.find_record(spec, owner, key).await? else {
      return Ok(WriteOutcome::NotFound);
    };

    strip_reserved(&mut patch);
    if let Some(next) = patch.get(spec.lookup_field)
      && !matches!(next, Value::String(s) if !s.is_empty())
    {
      return Err(
        dictstore_core::Error::KeyRemoved { field: spec.lookup_field }.into(),
      );
    }
    if patch.is_empty() {
      return Ok(WriteOutcome::Written(current));
    }

    let id_str = encode_uuid(current.record_id);
    let changed = guard::changed_keys(&spec, &current.body, &patch);
    if !changed.is_empty() {
      let owner_key = owner.cloned();
      let exclude = id_str.clone();
      let collisions = self
        .conn
        .call(move |conn| {
          Ok(guard::existing_collisions(
            conn,
            &spec,
            owner_key.as_ref(),
            &[changed],
            Some(&exclude),
          )?)
        })
        .await?;
      if !collisions.is_empty() {
        let conflict = Conflict::new(collisions);
        info!(kind = %spec.kind, key, %conflict, "update rejected");
        return Ok(WriteOutcome::Conflict(conflict));
      }
    }

    let patch_str = encode_body(&patch)?;
    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "UPDATE {} SET body = json_patch(body, ?1) WHERE record_id = ?2",
            spec.collection
          ),
          rusqlite::params![patch_str, id_str],
        )?;
        Ok(resolve::record_by_id(conn, &spec, &id_str)?)
      })
      .await?;

    match raw {
      Some(raw) => {
        debug!(kind = %spec.kind, key, "content record updated");
        Ok(WriteOutcome::Written(raw.into_record(spec.kind)?))
      }
      // Deleted by a concurrent writer between resolve and update.
      None => Ok(WriteOutcome::NotFound),
    }
  }

  pub(crate) async fn delete_record(
    &self,
    spec: CollectionSpec,
    owner: Option<&DictionaryKey>,
    key: &str,
  ) -> Result<bool> {
    let owner_key = owner.cloned();
    let key_str = key.to_owned();
    let removed = self
      .conn
      .call(move |conn| {
        let Some(raw) = resolve::record(conn, &spec, owner_key.as_ref(), &key_str)?
        else {
          return Ok(false);
        };
        let n = conn.execute(
          &format!("DELETE FROM {} WHERE record_id = ?1", spec.collection),
          rusqlite::params![raw.record_id],
        )?;
        Ok(n > 0)
      })
      .await?;

    if removed {
      debug!(kind = %spec.kind, key, "content record deleted");
    }
    Ok(removed)
  }
}
