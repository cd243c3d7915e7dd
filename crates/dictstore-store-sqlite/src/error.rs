//! Error type for `dictstore-store-sqlite`.

use dictstore_core::error::{ErrorKind, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] dictstore_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// A write raced another writer past the pre-checks and hit a unique
  /// index.
  #[error("unique index violation: {0}")]
  UniqueViolation(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid collection declaration: {0}")]
  InvalidRegistry(String),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      failure,
      message,
    )) = &e
      && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    {
      return Self::UniqueViolation(
        message.clone().unwrap_or_else(|| failure.to_string()),
      );
    }
    Self::Database(e)
  }
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::UniqueViolation(_) => ErrorKind::Conflict,
      _ => ErrorKind::Unavailable,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
