//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use dictstore_core::{
  error::{ErrorKind, StoreError},
  store::Conflict,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Rejected by the pre-write key checks.
  #[error("conflict: {0}")]
  Conflict(Conflict),

  /// Rejected by a unique index after the pre-write checks passed.
  #[error("conflict: {0}")]
  UniqueViolation(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend failure.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    match e.kind() {
      ErrorKind::Malformed => Self::BadRequest(e.to_string()),
      ErrorKind::Conflict => Self::UniqueViolation(e.to_string()),
      ErrorKind::Unavailable => Self::Store(Box::new(e)),
    }
  }

  fn class(&self) -> &'static str {
    match self {
      Self::NotFound(_) => "not_found",
      Self::BadRequest(_) => "malformed_input",
      Self::Conflict(_) | Self::UniqueViolation(_) => "conflict",
      Self::Store(_) => "dependency_unavailable",
    }
  }
}

impl From<dictstore_core::Error> for ApiError {
  fn from(e: dictstore_core::Error) -> Self { Self::BadRequest(e.to_string()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let class = self.class();
    let body = match &self {
      ApiError::NotFound(m) | ApiError::BadRequest(m) => {
        json!({ "error": class, "message": m })
      }
      ApiError::Conflict(conflict) => json!({
        "error": class,
        "message": conflict.to_string(),
        "collisions": conflict.collisions,
      }),
      ApiError::UniqueViolation(detail) => {
        warn!(%detail, "unique index violation");
        json!({
          "error": class,
          "message": "a record with the same key was written concurrently",
        })
      }
      ApiError::Store(e) => {
        error!(error = %e, "store failure");
        json!({ "error": class, "message": "the data store is unavailable" })
      }
    };

    let status = match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) | ApiError::UniqueViolation(_) => {
        StatusCode::CONFLICT
      }
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(body)).into_response()
  }
}
