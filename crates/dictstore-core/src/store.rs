//! The `DictionaryStore` trait and its outcome types.
//!
//! The trait is implemented by storage backends (e.g.
//! `dictstore-store-sqlite`). The HTTP layer depends on this abstraction, not
//! on any concrete backend.

use std::{fmt, future::Future};

use serde::Serialize;
use serde_json::Value;

use crate::{
  collection::ContentKind,
  content::{ContentRecord, Document},
  dictionary::{
    DictionaryKey, DictionaryPatch, DictionaryType, DictionaryVersion,
    NewDictionaryVersion,
  },
  error::StoreError,
  query::{ListQuery, Page},
};

// ─── Conflicts ───────────────────────────────────────────────────────────────

/// One natural-key value that blocked a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCollision {
  pub field:        String,
  pub value:        String,
  /// `true` when the value repeats inside the submitted batch rather than
  /// matching a stored record.
  pub within_batch: bool,
}

impl KeyCollision {
  pub fn existing(field: &str, value: impl Into<String>) -> Self {
    Self { field: field.to_owned(), value: value.into(), within_batch: false }
  }

  pub fn within_batch(field: &str, value: impl Into<String>) -> Self {
    Self { field: field.to_owned(), value: value.into(), within_batch: true }
  }
}

/// A rejected write, naming every colliding key value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
  pub collisions: Vec<KeyCollision>,
}

impl Conflict {
  pub fn new(collisions: Vec<KeyCollision>) -> Self { Self { collisions } }
}

impl fmt::Display for Conflict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let render = |within: bool| {
      self
        .collisions
        .iter()
        .filter(|c| c.within_batch == within)
        .map(|c| format!("{}={}", c.field, c.value))
        .collect::<Vec<_>>()
        .join(", ")
    };

    let existing = render(false);
    let repeated = render(true);
    match (existing.is_empty(), repeated.is_empty()) {
      (false, true) => write!(f, "already exist: {existing}"),
      (true, false) => write!(f, "repeated within the request: {repeated}"),
      (true, true) => f.write_str("no key collisions"),
      (false, false) => write!(
        f,
        "already exist: {existing}; repeated within the request: {repeated}"
      ),
    }
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of a write whose expected failures are part of its contract.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
  Written(T),
  /// The target record, or the dictionary that must own it, does not exist.
  NotFound,
  /// A natural key is already taken; nothing was written.
  Conflict(Conflict),
}

impl<T> WriteOutcome<T> {
  pub fn written(self) -> Option<T> {
    match self {
      Self::Written(t) => Some(t),
      _ => None,
    }
  }

  pub fn is_conflict(&self) -> bool { matches!(self, Self::Conflict(_)) }
}

/// How many records a cascading delete removed from one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeCount {
  pub kind:    ContentKind,
  pub removed: u64,
}

/// What a dictionary deletion removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeReport {
  pub dictionary: DictionaryVersion,
  pub purged:     Vec<PurgeCount>,
}

impl CascadeReport {
  pub fn total_purged(&self) -> u64 {
    self.purged.iter().map(|p| p.removed).sum()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a dictionary store backend.
///
/// Records are addressed by natural key only. Content operations take an
/// `owner` that must be `Some` for dictionary-owned kinds and `None` for the
/// independent ones; a mismatch is malformed input.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DictionaryStore: Send + Sync {
  type Error: StoreError;

  // ── Dictionary versions ───────────────────────────────────────────────

  /// Create a dictionary version. `creation_date` is set by the store.
  /// Conflicts when `(dictionary_type, dictionary_version)` already exists.
  fn create_dictionary(
    &self,
    dictionary_type: DictionaryType,
    input: NewDictionaryVersion,
  ) -> impl Future<Output = Result<WriteOutcome<DictionaryVersion>, Self::Error>>
  + Send
  + '_;

  /// List the versions of one dictionary type.
  fn list_dictionaries<'a>(
    &'a self,
    dictionary_type: DictionaryType,
    query: &'a ListQuery,
  ) -> impl Future<Output = Result<Page<DictionaryVersion>, Self::Error>> + Send + 'a;

  /// Retrieve a version by natural key. Returns `None` if not found.
  fn get_dictionary<'a>(
    &'a self,
    key: &'a DictionaryKey,
  ) -> impl Future<Output = Result<Option<DictionaryVersion>, Self::Error>> + Send + 'a;

  /// Apply a partial update. Returns `None` if not found.
  fn update_dictionary<'a>(
    &'a self,
    key: &'a DictionaryKey,
    patch: DictionaryPatch,
  ) -> impl Future<Output = Result<Option<DictionaryVersion>, Self::Error>> + Send + 'a;

  /// Delete a version and every record it owns. Children go first, the
  /// version record last. Returns `None` if not found.
  fn delete_dictionary<'a>(
    &'a self,
    key: &'a DictionaryKey,
  ) -> impl Future<Output = Result<Option<CascadeReport>, Self::Error>> + Send + 'a;

  // ── Content ───────────────────────────────────────────────────────────

  /// Insert a batch of candidates, all or nothing. Returns the stored
  /// records in input order, `NotFound` if the owning dictionary does not
  /// exist, or `Conflict` if any natural key is taken.
  fn create_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    candidates: Vec<Value>,
  ) -> impl Future<Output = Result<WriteOutcome<Vec<ContentRecord>>, Self::Error>>
  + Send
  + 'a;

  /// Filter, sort and paginate one collection within `owner`.
  fn list_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    query: &'a ListQuery,
  ) -> impl Future<Output = Result<Page<ContentRecord>, Self::Error>> + Send + 'a;

  /// Every record within `owner` whose lookup key is in `keys`.
  fn bulk_query_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    keys: &'a [String],
  ) -> impl Future<Output = Result<Vec<ContentRecord>, Self::Error>> + Send + 'a;

  /// Retrieve one record by lookup key. Returns `None` if not found.
  fn get_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<ContentRecord>, Self::Error>> + Send + 'a;

  /// Merge `patch` into one record. Conflicts if the patch moves a unique
  /// field onto a value another record holds.
  fn update_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    key: &'a str,
    patch: Document,
  ) -> impl Future<Output = Result<WriteOutcome<ContentRecord>, Self::Error>>
  + Send
  + 'a;

  /// Delete one record. Returns `false` if not found.
  fn delete_content<'a>(
    &'a self,
    kind: ContentKind,
    owner: Option<&'a DictionaryKey>,
    key: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn conflict_message_separates_sources() {
    let conflict = Conflict::new(vec![
      KeyCollision::existing("command_stem", "PWR_ON"),
      KeyCollision::within_batch("command_stem", "PWR_OFF"),
    ]);
    assert_eq!(
      conflict.to_string(),
      "already exist: command_stem=PWR_ON; repeated within the request: \
       command_stem=PWR_OFF"
    );
    let values: Vec<&str> =
      conflict.collisions.iter().map(|c| c.value.as_str()).collect();
    assert_eq!(values, ["PWR_ON", "PWR_OFF"]);
  }

  #[test]
  fn outcome_accessors() {
    assert_eq!(WriteOutcome::Written(3).written(), Some(3));
    assert_eq!(WriteOutcome::<u8>::NotFound.written(), None);
    assert!(WriteOutcome::<u8>::Conflict(Conflict::new(vec![])).is_conflict());
  }
}
