//! Handlers for `/dictionaries/{type}/versions` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/dictionaries/{type}/versions` | 409 if the version exists |
//! | `GET`    | `/dictionaries/{type}/versions` | `state_filter`, `description_filter`, paging |
//! | `GET`    | `/dictionaries/{type}/versions/{version}` | 404 if not found |
//! | `PATCH`  | `/dictionaries/{type}/versions/{version}` | Body: any of `dictionary_description`, `state` |
//! | `DELETE` | `/dictionaries/{type}/versions/{version}` | Cascades to owned content |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use dictstore_core::{
  dictionary::{
    DICTIONARY_FILTERS, DictionaryKey, DictionaryPatch, DictionaryType,
    DictionaryVersion, NewDictionaryVersion,
  },
  store::{DictionaryStore, WriteOutcome},
};
use serde::Serialize;

use crate::{
  ApiState, TOTAL_COUNT,
  error::ApiError,
  extract::JsonBody,
  params::{RawParams, list_query},
};

/// Wrapper used by create and update responses.
#[derive(Debug, Serialize)]
pub struct DictionaryInfo {
  pub dictionary_info: DictionaryVersion,
}

/// An unknown dictionary type names no resource, so it is a 404.
pub(crate) fn dictionary_type(raw: &str) -> Result<DictionaryType, ApiError> {
  raw
    .parse()
    .map_err(|_| ApiError::NotFound(format!("no dictionary type {raw:?}")))
}

fn not_found(key: &DictionaryKey) -> ApiError {
  ApiError::NotFound(format!("dictionary version {key} does not exist"))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /dictionaries/{type}/versions`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Path(raw_type): Path<String>,
  JsonBody(body): JsonBody<NewDictionaryVersion>,
) -> Result<Json<DictionaryInfo>, ApiError>
where
  S: DictionaryStore,
{
  let dictionary_type = dictionary_type(&raw_type)?;
  match state
    .store
    .create_dictionary(dictionary_type, body)
    .await
    .map_err(ApiError::from_store)?
  {
    WriteOutcome::Written(version) => {
      Ok(Json(DictionaryInfo { dictionary_info: version }))
    }
    WriteOutcome::Conflict(conflict) => Err(ApiError::Conflict(conflict)),
    WriteOutcome::NotFound => Err(ApiError::NotFound(format!(
      "no dictionary type {raw_type:?}"
    ))),
  }
}

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /dictionaries/{type}/versions`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Path(raw_type): Path<String>,
  Query(params): Query<RawParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DictionaryStore,
{
  let dictionary_type = dictionary_type(&raw_type)?;
  let query = list_query(&params, DICTIONARY_FILTERS)?;
  let page = state
    .store
    .list_dictionaries(dictionary_type, &query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(([(TOTAL_COUNT, page.total.to_string())], Json(page.items)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /dictionaries/{type}/versions/{version}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path((raw_type, version)): Path<(String, String)>,
) -> Result<Json<DictionaryVersion>, ApiError>
where
  S: DictionaryStore,
{
  let key = DictionaryKey::new(dictionary_type(&raw_type)?, version);
  state
    .store
    .get_dictionary(&key)
    .await
    .map_err(ApiError::from_store)?
    .map(Json)
    .ok_or_else(|| not_found(&key))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PATCH /dictionaries/{type}/versions/{version}`
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  Path((raw_type, version)): Path<(String, String)>,
  JsonBody(patch): JsonBody<DictionaryPatch>,
) -> Result<Json<DictionaryInfo>, ApiError>
where
  S: DictionaryStore,
{
  let key = DictionaryKey::new(dictionary_type(&raw_type)?, version);
  state
    .store
    .update_dictionary(&key, patch)
    .await
    .map_err(ApiError::from_store)?
    .map(|v| Json(DictionaryInfo { dictionary_info: v }))
    .ok_or_else(|| not_found(&key))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /dictionaries/{type}/versions/{version}`
pub async fn delete<S>(
  State(state): State<ApiState<S>>,
  Path((raw_type, version)): Path<(String, String)>,
) -> Result<StatusCode, ApiError>
where
  S: DictionaryStore,
{
  let key = DictionaryKey::new(dictionary_type(&raw_type)?, version);
  state
    .store
    .delete_dictionary(&key)
    .await
    .map_err(ApiError::from_store)?
    .map(|_| StatusCode::NO_CONTENT)
    .ok_or_else(|| not_found(&key))
}
