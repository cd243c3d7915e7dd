//! Error types for `dictstore-core`.
//!
//! Every variant of [`Error`] is a caller-level contract violation. Absent
//! records and key collisions are not errors; they are reported through
//! `Option` and [`crate::store::WriteOutcome`].

use thiserror::Error;

use crate::collection::ContentKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown dictionary type: {0:?}")]
  UnknownDictionaryType(String),

  #[error("unknown dictionary state: {0:?}")]
  UnknownState(String),

  #[error("unknown content collection: {0:?}")]
  UnknownCollection(String),

  #[error("invalid value {value:?} for filter {field}")]
  InvalidFilterValue { field: String, value: String },

  #[error("unknown sort direction: {0:?}")]
  InvalidSortDirection(String),

  #[error("{kind} records must be addressed through a dictionary version")]
  OwnerRequired { kind: ContentKind },

  #[error("{kind} records do not belong to a dictionary version")]
  OwnerNotAllowed { kind: ContentKind },

  #[error("dictionary version must not be empty")]
  EmptyVersion,

  #[error("record {index} is not a JSON object")]
  NotAnObject { index: usize },

  #[error("record {index} is missing its {field} key")]
  MissingKey { index: usize, field: &'static str },

  #[error("update would remove the {field} key")]
  KeyRemoved { field: &'static str },

  #[error("too many keys in one request: {count} (limit {limit})")]
  TooManyKeys { count: usize, limit: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Broad failure classes a caller translates into transport status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The request itself is wrong; retrying it unchanged will fail again.
  Malformed,
  /// The database rejected a write on a unique index.
  Conflict,
  /// The database or its connection failed.
  Unavailable,
}

/// Implemented by every backend error so that higher layers can classify
/// failures without knowing the backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind { ErrorKind::Malformed }
}
