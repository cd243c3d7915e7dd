//! Request extractors whose rejections render as [`ApiError`] bodies.

use axum::extract::{FromRequest, rejection::JsonRejection};

use crate::error::ApiError;

/// A JSON request body. Unparseable or mistyped bodies are a 400 with the
/// usual error envelope instead of axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}
