//! [`SqliteStore`], the SQLite implementation of [`DictionaryStore`].

use std::{path::Path, sync::Arc};

use serde_json::Value;
use tracing::debug;

use dictstore_core::{
  collection::{CollectionRegistry, CollectionSpec, ContentKind},
  content::{ContentRecord, Document},
  dictionary::{
    DictionaryKey, DictionaryPatch, DictionaryType, DictionaryVersion,
    NewDictionaryVersion,
  },
  query::{ListQuery, Page},
  store::{CascadeReport, DictionaryStore, WriteOutcome},
};

use crate::{Error, Result, query::register_functions, schema::schema};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A dictionary store backed by a single SQLite file.
///
/// Cloning is cheap: the connection and the registry are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn:     tokio_rusqlite::Connection,
  pub(crate) registry: Arc<CollectionRegistry>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with the standard collections.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, CollectionRegistry::standard()).await
  }

  /// Open (or create) a store at `path` managing the given collections.
  pub async fn open_with(
    path: impl AsRef<Path>,
    registry: CollectionRegistry,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, registry).await
  }

  /// Open an in-memory store, for tests and `--in-memory` runs.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, CollectionRegistry::standard()).await
  }

  async fn init(
    conn: tokio_rusqlite::Connection,
    registry: CollectionRegistry,
  ) -> Result<Self> {
    let store = Self { conn, registry: Arc::new(registry) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let ddl = schema(&self.registry)?;
    self
      .conn
      .call(move |conn| {
        register_functions(conn)?;
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;
    debug!(
      collections = self.registry.iter().count(),
      "schema initialised"
    );
    Ok(())
  }

  /// The declaration for `kind`, checked against the owner the caller
  /// supplied.
  pub(crate) fn spec(
    &self,
    kind: ContentKind,
    owner: Option<&DictionaryKey>,
  ) -> Result<CollectionSpec> {
    let spec = *self.registry.get(kind)?;
    spec.check_owner(owner)?;
    Ok(spec)
  }
}

// ─── DictionaryStore impl ────────────────────────────────────────────────────

impl DictionaryStore for SqliteStore {
  type Error = Error;

  // ── Dictionary versions ───────────────────────────────────────────────────

  async fn create_dictionary(
    &self,
    dictionary_type: DictionaryType,
    input: NewDictionaryVersion,
  ) -> Result<WriteOutcome<DictionaryVersion>> {
    self.create_version(dictionary_type, input).await
  }

  async fn list_dictionaries<'a>(
    &'a self,
    dictionary_type: DictionaryType,
    query: &'a ListQuery,
  ) -> Result<Page<DictionaryVersion>> {
    self.list_versions(dictionary_type, query).await
  }

  async fn get_dictionary<'a>(
    &'a self,
    key: &'a DictionaryKey,
  ) -> Result<Option<DictionaryVersion>> {
    self.find_version(key).await
  }

  async fn update_dictionary<'a>(
    &'a self,
    key: &'a DictionaryKey,
    patch: DictionaryPatch,
  ) -> Result<Option<DictionaryVersion>> {
    self.patch_version(key, patch).await
  }

  async fn delete_dictionary<'a>(
    &'a self,
    key: &'a DictionaryKey,
  ) -> Result<Option<CascadeReport>> {
    self.delete_version(key).await
  }

  // ── Content ───────────────────────────────────────────────────────────────

  async fn create_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    candidates: Vec<Value>,
  ) -> Result<WriteOutcome<Vec<ContentRecord>>> {
    let spec = self.spec(kind, owner)?;
    self.insert_records(spec, owner, candidates).await
  }

  async fn list_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    query: &'a ListQuery,
  ) -> Result<Page<ContentRecord>> {
    let spec = self.spec(kind, owner)?;
    self.list_records(spec, owner, query).await
  }

  async fn bulk_query_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    keys: &'a [String],
  ) -> Result<Vec<ContentRecord>> {
    let spec = self.spec(kind, owner)?;
    self.records_by_keys(spec, owner, keys).await
  }

  async fn get_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    key: &'a str,
  ) -> Result<Option<ContentRecord>> {
    let spec = self.spec(kind, owner)?;
    self.find_record(spec, owner, key).await
  }

  async fn update_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    key: &'a str,
    patch: Document,
  ) -> Result<WriteOutcome<ContentRecord>> {
    let spec = self.spec(kind, owner)?;
    self.patch_record(spec, owner, key, patch).await
  }

  async fn delete_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    key: &'a str,
  ) -> Result<bool> {
    let spec = self.spec(kind, owner)?;
    self.delete_record(spec, owner, key).await
  }
}
