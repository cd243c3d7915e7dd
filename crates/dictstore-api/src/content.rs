//! Handlers for content collections.
//!
//! Dictionary-owned kinds live under
//! `/dictionaries/{type}/versions/{version}/{segment}`, where `{segment}` is
//! `cmds`, `evrs`, `channels` or `mil1553`. The independent kinds have fixed
//! roots (`/vnv/vis`, `/custom_scripts`) and are routed with their kind bound
//! in [`crate::api_router`].
//!
//! | Method   | Path (relative to the collection root) | Notes |
//! |----------|------|-------|
//! | `GET`    | `/` | Declared filters, `wild`, paging; `x-total-count` header |
//! | `POST`   | `/` | Body: object or array of objects; 201 with the created records |
//! | `POST`   | `/bulk_query` | Body: array of keys |
//! | `GET`    | `/{key}` | 404 if not found |
//! | `PATCH`  | `/{key}` | JSON merge patch |
//! | `DELETE` | `/{key}` | 204 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use dictstore_core::{
  collection::{CollectionSpec, ContentKind},
  content::ContentRecord,
  dictionary::DictionaryKey,
  store::{DictionaryStore, WriteOutcome},
};
use serde_json::Value;

use crate::{
  ApiState, TOTAL_COUNT,
  dictionaries::dictionary_type,
  error::ApiError,
  extract::JsonBody,
  params::{RawParams, list_query},
};

// ─── Addressing ──────────────────────────────────────────────────────────────

/// Resolve the owner key and collection named by a dictionary-scoped path.
fn owned<S>(
  state: &ApiState<S>,
  raw_type: &str,
  version: String,
  segment: &str,
) -> Result<(DictionaryKey, CollectionSpec), ApiError> {
  let key = DictionaryKey::new(dictionary_type(raw_type)?, version);
  let spec = state
    .registry
    .dependent_by_segment(segment)
    .copied()
    .ok_or_else(|| ApiError::NotFound(format!("no collection {segment:?}")))?;
  Ok((key, spec))
}

fn global<S>(
  state: &ApiState<S>,
  kind: ContentKind,
) -> Result<CollectionSpec, ApiError> {
  state
    .registry
    .get(kind)
    .copied()
    .map_err(|_| ApiError::NotFound(format!("no {kind} collection")))
}

fn record_not_found(spec: &CollectionSpec, key: &str) -> ApiError {
  ApiError::NotFound(format!("no {} with {} {key:?}", spec.kind, spec.lookup_field))
}

// ─── Shared operations ───────────────────────────────────────────────────────

async fn list<S: DictionaryStore>(
  state: &ApiState<S>,
  spec: &CollectionSpec,
  owner: Option<&DictionaryKey>,
  params: &RawParams,
) -> Result<Response, ApiError> {
  let query = list_query(params, spec.filters)?;
  let page = state
    .store
    .list_content(spec.kind, owner, &query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(([(TOTAL_COUNT, page.total.to_string())], Json(page.items)).into_response())
}

async fn create<S: DictionaryStore>(
  state: &ApiState<S>,
  spec: &CollectionSpec,
  owner: Option<&DictionaryKey>,
  body: Value,
) -> Result<Response, ApiError> {
  let candidates = match body {
    Value::Array(items) => items,
    object @ Value::Object(_) => vec![object],
    _ => {
      return Err(ApiError::BadRequest(
        "body must be an object or an array of objects".into(),
      ));
    }
  };

  match state
    .store
    .create_content(spec.kind, owner, candidates)
    .await
    .map_err(ApiError::from_store)?
  {
    WriteOutcome::Written(records) => {
      Ok((StatusCode::CREATED, Json(records)).into_response())
    }
    WriteOutcome::Conflict(conflict) => Err(ApiError::Conflict(conflict)),
    WriteOutcome::NotFound => Err(ApiError::NotFound(match owner {
      Some(key) => format!("dictionary version {key} does not exist"),
      None => format!("no {} collection", spec.kind),
    })),
  }
}

async fn bulk_query<S: DictionaryStore>(
  state: &ApiState<S>,
  spec: &CollectionSpec,
  owner: Option<&DictionaryKey>,
  keys: Vec<String>,
) -> Result<Json<Vec<ContentRecord>>, ApiError> {
  let records = state
    .store
    .bulk_query_content(spec.kind, owner, &keys)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(records))
}

async fn get_one<S: DictionaryStore>(
  state: &ApiState<S>,
  spec: &CollectionSpec,
  owner: Option<&DictionaryKey>,
  key: &str,
) -> Result<Json<ContentRecord>, ApiError> {
  state
    .store
    .get_content(spec.kind, owner, key)
    .await
    .map_err(ApiError::from_store)?
    .map(Json)
    .ok_or_else(|| record_not_found(spec, key))
}

async fn update<S: DictionaryStore>(
  state: &ApiState<S>,
  spec: &CollectionSpec,
  owner: Option<&DictionaryKey>,
  key: &str,
  body: Value,
) -> Result<Json<ContentRecord>, ApiError> {
  let Value::Object(patch) = body else {
    return Err(ApiError::BadRequest("body must be a JSON object".into()));
  };

  match state
    .store
    .update_content(spec.kind, owner, key, patch)
    .await
    .map_err(ApiError::from_store)?
  {
    WriteOutcome::Written(record) => Ok(Json(record)),
    WriteOutcome::Conflict(conflict) => Err(ApiError::Conflict(conflict)),
    WriteOutcome::NotFound => Err(record_not_found(spec, key)),
  }
}

async fn delete<S: DictionaryStore>(
  state: &ApiState<S>,
  spec: &CollectionSpec,
  owner: Option<&DictionaryKey>,
  key: &str,
) -> Result<StatusCode, ApiError> {
  let removed = state
    .store
    .delete_content(spec.kind, owner, key)
    .await
    .map_err(ApiError::from_store)?;
  if removed {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(record_not_found(spec, key))
  }
}

// ─── Dictionary-owned handlers ───────────────────────────────────────────────

/// `GET /dictionaries/{type}/versions/{version}/{segment}`
pub async fn list_owned<S: DictionaryStore>(
  State(state): State<ApiState<S>>,
  Path((raw_type, version, segment)): Path<(String, String, String)>,
  Query(params): Query<RawParams>,
) -> Result<Response, ApiError> {
  let (owner, spec) = owned(&state, &raw_type, version, &segment)?;
  list(&state, &spec, Some(&owner), &params).await
}

/// `POST /dictionaries/{type}/versions/{version}/{segment}`
pub async fn create_owned<S: DictionaryStore>(
  State(state): State<ApiState<S>>,
  Path((raw_type, version, segment)): Path<(String, String, String)>,
  JsonBody(body): JsonBody<Value>,
) -> Result<Response, ApiError> {
  let (owner, spec) = owned(&state, &raw_type, version, &segment)?;
  create(&state, &spec, Some(&owner), body).await
}

/// `POST /dictionaries/{type}/versions/{version}/{segment}/bulk_query`
pub async fn bulk_query_owned<S: DictionaryStore>(
  State(state): State<ApiState<S>>,
  Path((raw_type, version, segment)): Path<(String, String, String)>,
  JsonBody(keys): JsonBody<Vec<String>>,
) -> Result<Json<Vec<ContentRecord>>, ApiError> {
  let (owner, spec) = owned(&state, &raw_type, version, &segment)?;
  bulk_query(&state, &spec, Some(&owner), keys).await
}

/// `GET /dictionaries/{type}/versions/{version}/{segment}/{key}`
pub async fn get_owned<S: DictionaryStore>(
  State(state): State<ApiState<S>>,
  Path((raw_type, version, segment, key)): Path<(String, String, String, String)>,
) -> Result<Json<ContentRecord>, ApiError> {
  let (owner, spec) = owned(&state, &raw_type, version, &segment)?;
  get_one(&state, &spec, Some(&owner), &key).await
}

/// `PATCH /dictionaries/{type}/versions/{version}/{segment}/{key}`
pub async fn update_owned<S: DictionaryStore>(
  State(state): State<ApiState<S>>,
  Path((raw_type, version, segment, key)): Path<(String, String, String, String)>,
  JsonBody(body): JsonBody<Value>,
) -> Result<Json<ContentRecord>, ApiError> {
  let (owner, spec) = owned(&state, &raw_type, version, &segment)?;
  update(&state, &spec, Some(&owner), &key, body).await
}

/// `DELETE /dictionaries/{type}/versions/{version}/{segment}/{key}`
pub async fn delete_owned<S: DictionaryStore>(
  State(state): State<ApiState<S>>,
  Path((raw_type, version, segment, key)): Path<(String, String, String, String)>,
) -> Result<StatusCode, ApiError> {
  let (owner, spec) = owned(&state, &raw_type, version, &segment)?;
  delete(&state, &spec, Some(&owner), &key).await
}

// ─── Independent handlers ────────────────────────────────────────────────────

pub async fn list_global<S: DictionaryStore>(
  state: ApiState<S>,
  kind: ContentKind,
  params: RawParams,
) -> Result<Response, ApiError> {
  let spec = global(&state, kind)?;
  list(&state, &spec, None, &params).await
}

pub async fn create_global<S: DictionaryStore>(
  state: ApiState<S>,
  kind: ContentKind,
  body: Value,
) -> Result<Response, ApiError> {
  let spec = global(&state, kind)?;
  create(&state, &spec, None, body).await
}

pub async fn bulk_query_global<S: DictionaryStore>(
  state: ApiState<S>,
  kind: ContentKind,
  keys: Vec<String>,
) -> Result<Json<Vec<ContentRecord>>, ApiError> {
  let spec = global(&state, kind)?;
  bulk_query(&state, &spec, None, keys).await
}

pub async fn get_global<S: DictionaryStore>(
  state: ApiState<S>,
  kind: ContentKind,
  key: String,
) -> Result<Json<ContentRecord>, ApiError> {
  let spec = global(&state, kind)?;
  get_one(&state, &spec, None, &key).await
}

pub async fn update_global<S: DictionaryStore>(
  state: ApiState<S>,
  kind: ContentKind,
  key: String,
  body: Value,
) -> Result<Json<ContentRecord>, ApiError> {
  let spec = global(&state, kind)?;
  update(&state, &spec, None, &key, body).await
}

pub async fn delete_global<S: DictionaryStore>(
  state: ApiState<S>,
  kind: ContentKind,
  key: String,
) -> Result<StatusCode, ApiError> {
  let spec = global(&state, kind)?;
  delete(&state, &spec, None, &key).await
}
