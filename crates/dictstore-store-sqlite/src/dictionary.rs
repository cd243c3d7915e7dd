//! Dictionary version lifecycle: create, list, get, partial update and the
//! cascading delete.

use chrono::{SubsecRound as _, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use dictstore_core::{
  dictionary::{
    DICTIONARY_DEFAULT_SORT, DICTIONARY_SORTS, DictionaryKey, DictionaryPatch,
    DictionaryType, DictionaryVersion, NewDictionaryVersion,
  },
  query::{ListQuery, Page, resolve_sort},
  store::{CascadeReport, Conflict, KeyCollision, PurgeCount, WriteOutcome},
};

use crate::{
  Error, Result,
  encode::{DICTIONARY_COLUMNS, RawDictionary, encode_dt, encode_uuid},
  query::{Select, Target},
  resolve,
  store::SqliteStore,
};

/// Dictionary fields are real columns; anything else is not filterable.
fn column(field: &str) -> Option<&'static str> {
  match field {
    "dictionary_version" => Some("dictionary_version"),
    "dictionary_description" => Some("dictionary_description"),
    "state" => Some("state"),
    "creation_date" => Some("creation_date"),
    _ => None,
  }
}

impl SqliteStore {
  pub(crate) async fn create_version(
    &self,
    dictionary_type: DictionaryType,
    input: NewDictionaryVersion,
  ) -> Result<WriteOutcome<DictionaryVersion>> {
    if input.dictionary_version.trim().is_empty() {
      return Err(dictstore_core::Error::EmptyVersion.into());
    }

    let version = DictionaryVersion {
      dictionary_id: Uuid::new_v4(),
      dictionary_type,
      dictionary_version: input.dictionary_version,
      description: input.description,
      state: input.state,
      // Stored with microsecond precision; truncate so reads compare equal.
      creation_date: Utc::now().trunc_subsecs(6),
    };

    let key = version.key();
    let id_str = encode_uuid(version.dictionary_id);
    let type_str = dictionary_type.as_str();
    let version_str = version.dictionary_version.clone();
    let description = version.description.clone();
    let state_str = version.state.as_str();
    let created_str = encode_dt(version.creation_date);

    let lookup_key = key.clone();
    let inserted = self
      .conn
      .call(move |conn| {
        if resolve::dictionary(conn, &lookup_key)?.is_some() {
          return Ok(false);
        }
        conn.execute(
          "INSERT INTO dictionaries (
             dictionary_id, dictionary_type, dictionary_version,
             dictionary_description, state, creation_date
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str,
            type_str,
            version_str,
            description,
            state_str,
            created_str,
          ],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      info!(%key, "dictionary version already exists");
      return Ok(WriteOutcome::Conflict(Conflict::new(vec![
        KeyCollision::existing("dictionary_version", key.dictionary_version),
      ])));
    }

    info!(%key, id = %version.dictionary_id, "dictionary version created");
    Ok(WriteOutcome::Written(version))
  }

  pub(crate) async fn list_versions(
    &self,
    dictionary_type: DictionaryType,
    query: &ListQuery,
  ) -> Result<Page<DictionaryVersion>> {
    let mut select = Select::new("dictionaries")
      .eq("dictionary_type", dictionary_type.as_str().to_owned());
    for filter in &query.filters {
      let Some(name) = column(filter.field) else {
        return Err(
          dictstore_core::Error::InvalidFilterValue {
            field: filter.field.to_owned(),
            value: filter.value.to_string(),
          }
          .into(),
        );
      };
      select = select.filter(Target::Column(name), filter);
    }

    let sort_field =
      resolve_sort(DICTIONARY_SORTS, query.sort_by.as_deref(), DICTIONARY_DEFAULT_SORT);
    let sort = Target::Column(column(sort_field).unwrap_or("dictionary_version"));
    let direction = query.direction;
    let limit = query.effective_limit();
    let offset = query.offset;

    let (raws, total) = self
      .conn
      .call(move |conn| {
        let total = select.count(conn)?;
        let raws = select.page(
          conn,
          DICTIONARY_COLUMNS,
          sort,
          direction,
          limit,
          offset,
          RawDictionary::from_row,
        )?;
        Ok((raws, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawDictionary::into_dictionary)
      .collect::<Result<Vec<_>>>()?;
    Ok(Page { items, total })
  }

  pub(crate) async fn find_version(
    &self,
    key: &DictionaryKey,
  ) -> Result<Option<DictionaryVersion>> {
    let key = key.clone();
    let raw = self
      .conn
      .call(move |conn| Ok(resolve::dictionary(conn, &key)?))
      .await?;
    raw.map(RawDictionary::into_dictionary).transpose()
  }

  /// Only the supplied fields change; an empty patch returns the record as
  /// it stands.
  pub(crate) async fn patch_version(
    &self,
    key: &DictionaryKey,
    patch: DictionaryPatch,
  ) -> Result<Option<DictionaryVersion>> {
    if patch.is_empty() {
      return self.find_version(key).await;
    }

    let lookup_key = key.clone();
    let description = patch.description;
    let state_str = patch.state.map(|s| s.as_str());

    let raw = self
      .conn
      .call(move |conn| {
        let Some(current) = resolve::dictionary(conn, &lookup_key)? else {
          return Ok(None);
        };
        conn.execute(
          "UPDATE dictionaries
              SET dictionary_description = COALESCE(?1, dictionary_description),
                  state                  = COALESCE(?2, state)
            WHERE dictionary_id = ?3",
          rusqlite::params![description, state_str, current.dictionary_id],
        )?;
        Ok(resolve::dictionary_by_id(conn, &current.dictionary_id)?)
      })
      .await?;

    match raw {
      Some(raw) => {
        let version = raw.into_dictionary()?;
        info!(%key, state = version.state.as_str(), "dictionary version updated");
        Ok(Some(version))
      }
      None => Ok(None),
    }
  }

  /// Purge every record the version owns, one collection at a time, then
  /// remove the version itself.
  ///
  /// The phases are separate statements. If the final step fails the version
  /// survives with no content, and repeating the delete finishes the job.
  pub(crate) async fn delete_version(
    &self,
    key: &DictionaryKey,
  ) -> Result<Option<CascadeReport>> {
    let Some(dictionary) = self.find_version(key).await? else {
      debug!(%key, "dictionary version not found for delete");
      return Ok(None);
    };

    let mut purged = Vec::new();
    for spec in self.registry.iter() {
      let select = Select::new(spec.collection)
        .eq("dictionary_type", key.dictionary_type.as_str().to_owned())
        .eq("dictionary_version", key.dictionary_version.clone());
      let removed = self.conn.call(move |conn| Ok(select.delete(conn)?)).await?;
      debug!(%key, collection = spec.collection, removed, "purged owned records");
      purged.push(PurgeCount { kind: spec.kind, removed });
    }

    let id_str = encode_uuid(dictionary.dictionary_id);
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM dictionaries WHERE dictionary_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await
      .map_err(|e| {
        warn!(%key, error = %e, "content purged but dictionary version remains");
        Error::from(e)
      })?;

    let report = CascadeReport { dictionary, purged };
    info!(
      %key,
      removed_version = removed,
      purged = report.total_purged(),
      "dictionary version deleted"
    );
    Ok(Some(report))
  }
}
