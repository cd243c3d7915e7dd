//! JSON REST API for the dictionary store.
//!
//! Exposes an axum [`Router`] backed by any
//! [`dictstore_core::store::DictionaryStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v4", dictstore_api::api_router(store.clone()))
//! ```

pub mod content;
pub mod dictionaries;
pub mod error;
pub mod extract;
pub mod params;

use std::{collections::HashMap, sync::Arc};

use axum::{
  Json, Router,
  extract::{Path, Query, State},
  http::HeaderName,
  routing::{get, post},
};
use dictstore_core::{
  collection::{CollectionRegistry, ContentKind},
  store::DictionaryStore,
};
use serde_json::{Value, json};

pub use error::ApiError;
use extract::JsonBody;

/// Carries the pre-pagination match count on every list response.
pub const TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  pub registry: Arc<CollectionRegistry>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), registry: self.registry.clone() }
  }
}

/// Build a fully-materialised API router for `store` with the standard
/// collections.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: DictionaryStore + 'static,
{
  api_router_with(store, Arc::new(CollectionRegistry::standard()))
}

/// Like [`api_router`], for a store managing a custom set of collections.
pub fn api_router_with<S>(
  store: Arc<S>,
  registry: Arc<CollectionRegistry>,
) -> Router<()>
where
  S: DictionaryStore + 'static,
{
  let router = Router::new()
    .route("/health", get(health))
    // Dictionary versions
    .route(
      "/dictionaries/{dictionary_type}/versions",
      get(dictionaries::list::<S>).post(dictionaries::create::<S>),
    )
    .route(
      "/dictionaries/{dictionary_type}/versions/{dictionary_version}",
      get(dictionaries::get_one::<S>)
        .patch(dictionaries::update::<S>)
        .delete(dictionaries::delete::<S>),
    )
    // Dictionary-owned content
    .route(
      "/dictionaries/{dictionary_type}/versions/{dictionary_version}/{segment}",
      get(content::list_owned::<S>).post(content::create_owned::<S>),
    )
    .route(
      "/dictionaries/{dictionary_type}/versions/{dictionary_version}/{segment}/bulk_query",
      post(content::bulk_query_owned::<S>),
    )
    .route(
      "/dictionaries/{dictionary_type}/versions/{dictionary_version}/{segment}/{key}",
      get(content::get_owned::<S>)
        .patch(content::update_owned::<S>)
        .delete(content::delete_owned::<S>),
    );

  // Independent content
  let router = global_routes(
    router,
    "/vnv/vis",
    "bulk",
    ContentKind::VerificationItem,
  );
  let router = global_routes(
    router,
    "/custom_scripts",
    "bulk_query",
    ContentKind::CustomScript,
  );

  router.with_state(ApiState { store, registry })
}

/// Routes for one independent collection rooted at `root`.
fn global_routes<S>(
  router: Router<ApiState<S>>,
  root: &str,
  bulk: &str,
  kind: ContentKind,
) -> Router<ApiState<S>>
where
  S: DictionaryStore + 'static,
{
  router
    .route(
      root,
      get(
        move |State(state): State<ApiState<S>>,
              Query(params): Query<HashMap<String, String>>| {
          content::list_global(state, kind, params)
        },
      )
      .post(
        move |State(state): State<ApiState<S>>,
              JsonBody(body): JsonBody<Value>| {
          content::create_global(state, kind, body)
        },
      ),
    )
    .route(
      &format!("{root}/{bulk}"),
      post(
        move |State(state): State<ApiState<S>>,
              JsonBody(keys): JsonBody<Vec<String>>| {
          content::bulk_query_global(state, kind, keys)
        },
      ),
    )
    .route(
      &format!("{root}/{{key}}"),
      get(
        move |State(state): State<ApiState<S>>, Path(key): Path<String>| {
          content::get_global(state, kind, key)
        },
      )
      .patch(
        move |State(state): State<ApiState<S>>,
              Path(key): Path<String>,
              JsonBody(body): JsonBody<Value>| {
          content::update_global(state, kind, key, body)
        },
      )
      .delete(
        move |State(state): State<ApiState<S>>, Path(key): Path<String>| {
          content::delete_global(state, kind, key)
        },
      ),
    )
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "OK" })) }

// ─── Router tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, Response, StatusCode, header},
  };
  use dictstore_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    api_router(Arc::new(store))
  }

  async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string())),
      None => builder.body(Body::empty()),
    }
    .unwrap();
    app.clone().oneshot(req).await.unwrap()
  }

  async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn total(resp: &Response<Body>) -> u64 {
    resp.headers()[TOTAL_COUNT].to_str().unwrap().parse().unwrap()
  }

  async fn seed(app: &Router) {
    let resp = send(
      app,
      "POST",
      "/dictionaries/flight/versions",
      Some(json!({ "dictionary_version": "v1" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
      app,
      "POST",
      "/dictionaries/flight/versions/v1/cmds",
      Some(json!([
        { "command_stem": "PWR_ON", "operations_category": "POWER" },
        { "command_stem": "PWR_OFF", "operations_category": "POWER" },
        { "command_stem": "SET_STATE", "operations_category": "MODE" },
      ])),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
  }

  // ── Health ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_reports_ok() {
    let app = app().await;
    let resp = send(&app, "GET", "/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "status": "OK" }));
  }

  // ── Dictionaries ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_dictionary_wraps_info_and_conflicts_on_repeat() {
    let app = app().await;
    let body = json!({
      "dictionary_version": "v1",
      "dictionary_description": "first",
    });

    let resp = send(
      &app,
      "POST",
      "/dictionaries/flight/versions",
      Some(body.clone()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let info = json_body(resp).await;
    assert_eq!(info["dictionary_info"]["dictionary_version"], "v1");
    assert_eq!(info["dictionary_info"]["state"], "NOT_PUBLISHED");

    let resp = send(
      &app,
      "POST",
      "/dictionaries/flight/versions",
      Some(body),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(resp).await["error"], "conflict");
  }

  #[tokio::test]
  async fn unknown_dictionary_type_is_not_found() {
    let app = app().await;
    let resp = send(&app, "GET", "/dictionaries/ground/versions", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["error"], "not_found");
  }

  #[tokio::test]
  async fn dictionary_patch_get_and_delete() {
    let app = app().await;
    seed(&app).await;

    let resp = send(
      &app,
      "PATCH",
      "/dictionaries/flight/versions/v1",
      Some(json!({ "state": "PUBLISHED" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["dictionary_info"]["state"], "PUBLISHED");

    let resp = send(
      &app,
      "GET",
      "/dictionaries/flight/versions?state_filter=PUBLISHED",
      None,
    )
    .await;
    assert_eq!(total(&resp), 1);

    let resp = send(
      &app,
      "DELETE",
      "/dictionaries/flight/versions/v1",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(
      &app,
      "GET",
      "/dictionaries/flight/versions/v1",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send(
      &app,
      "GET",
      "/dictionaries/flight/versions/v1/cmds/PWR_ON",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send(
      &app,
      "DELETE",
      "/dictionaries/flight/versions/v1",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn invalid_state_filter_is_bad_request() {
    let app = app().await;
    let resp = send(
      &app,
      "GET",
      "/dictionaries/sse/versions?state_filter=DRAFT",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "malformed_input");
  }

  // ── Dictionary-owned content ────────────────────────────────────────────────

  #[tokio::test]
  async fn list_sets_total_count_and_pages() {
    let app = app().await;
    seed(&app).await;

    let resp = send(
      &app,
      "GET",
      "/dictionaries/flight/versions/v1/cmds?sort_by=command_stem&limit=1&offset=0",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(total(&resp), 3);
    let items = json_body(resp).await;
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0]["command_stem"], "PWR_OFF");
    assert_eq!(items[0]["dictionary_version"], "v1");
  }

  #[tokio::test]
  async fn wild_flag_switches_to_substring_match() {
    let app = app().await;
    seed(&app).await;

    let exact = send(
      &app,
      "GET",
      "/dictionaries/flight/versions/v1/cmds?command_stem=ST",
      None,
    )
    .await;
    assert_eq!(total(&exact), 0);

    let wild = send(
      &app,
      "GET",
      "/dictionaries/flight/versions/v1/cmds?command_stem=st&wild=true",
      None,
    )
    .await;
    assert_eq!(total(&wild), 1);
    assert_eq!(json_body(wild).await[0]["command_stem"], "SET_STATE");

    let by_cat = send(
      &app,
      "GET",
      "/dictionaries/flight/versions/v1/cmds?ops_cat=POWER",
      None,
    )
    .await;
    assert_eq!(total(&by_cat), 2);
  }

  #[tokio::test]
  async fn colliding_batch_is_409_with_collisions() {
    let app = app().await;
    seed(&app).await;

    let resp = send(
      &app,
      "POST",
      "/dictionaries/flight/versions/v1/cmds",
      Some(json!([{ "command_stem": "HEATER_ON" }, { "command_stem": "PWR_ON" }])),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = json_body(resp).await;
    assert_eq!(body["collisions"][0]["value"], "PWR_ON");

    let resp = send(
      &app,
      "GET",
      "/dictionaries/flight/versions/v1/cmds",
      None,
    )
    .await;
    assert_eq!(total(&resp), 3);
  }

  #[tokio::test]
  async fn create_under_missing_dictionary_is_404() {
    let app = app().await;
    let resp = send(
      &app,
      "POST",
      "/dictionaries/flight/versions/v9/evrs",
      Some(json!([{ "evr_name": "BOOT" }])),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn unknown_segment_is_404() {
    let app = app().await;
    seed(&app).await;
    let resp = send(
      &app,
      "GET",
      "/dictionaries/flight/versions/v1/vis",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn point_operations_by_key() {
    let app = app().await;
    seed(&app).await;

    let resp = send(
      &app,
      "PATCH",
      "/dictionaries/flight/versions/v1/cmds/PWR_ON",
      Some(json!({ "cmd_type": "FSW" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["cmd_type"], "FSW");

    let resp = send(
      &app,
      "GET",
      "/dictionaries/flight/versions/v1/cmds/PWR_ON",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["operations_category"], "POWER");

    let resp = send(
      &app,
      "PATCH",
      "/dictionaries/flight/versions/v1/cmds/PWR_ON",
      Some(json!({ "command_stem": "PWR_OFF" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(
      &app,
      "DELETE",
      "/dictionaries/flight/versions/v1/cmds/PWR_ON",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(
      &app,
      "DELETE",
      "/dictionaries/flight/versions/v1/cmds/PWR_ON",
      None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn bulk_query_returns_matches() {
    let app = app().await;
    seed(&app).await;

    let resp = send(
      &app,
      "POST",
      "/dictionaries/flight/versions/v1/cmds/bulk_query",
      Some(json!(["PWR_ON", "NOPE"])),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let items = json_body(resp).await;
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0]["command_stem"], "PWR_ON");

    let keys: Vec<String> = (0..10_001).map(|i| i.to_string()).collect();
    let resp = send(
      &app,
      "POST",
      "/dictionaries/flight/versions/v1/cmds/bulk_query",
      Some(json!(keys)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unparseable_body_gets_the_error_envelope() {
    let app = app().await;
    let req = Request::builder()
      .method("POST")
      .uri("/dictionaries/flight/versions")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from("{not json"))
      .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["error"], "malformed_input");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));

    let resp = send(
      &app,
      "POST",
      "/dictionaries/flight/versions/v1/cmds/bulk_query",
      Some(json!({ "keys": ["PWR_ON"] })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["error"], "malformed_input");
  }

  // ── Independent content ─────────────────────────────────────────────────────

  #[tokio::test]
  async fn verification_items_are_global() {
    let app = app().await;

    let resp = send(
      &app,
      "POST",
      "/vnv/vis",
      Some(json!({ "vi_id": "VI-1", "vi_name": "alpha" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = json_body(resp).await;
    assert!(created[0].get("dictionary_version").is_none());

    let resp = send(&app, "GET", "/vnv/vis?vi_name=alpha", None).await;
    assert_eq!(total(&resp), 1);

    let resp = send(&app, "POST", "/vnv/vis/bulk", Some(json!(["VI-1"]))).await;
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

    let resp = send(&app, "GET", "/vnv/vis/VI-1", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn custom_scripts_round_trip() {
    let app = app().await;

    let resp = send(
      &app,
      "POST",
      "/custom_scripts",
      Some(json!([{ "script_id": "S1", "script_name": "boot.py" }])),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(
      &app,
      "PATCH",
      "/custom_scripts/S1",
      Some(json!({ "status": "ACTIVE" })),
    )
    .await;
    assert_eq!(json_body(resp).await["status"], "ACTIVE");

    let resp = send(
      &app,
      "POST",
      "/custom_scripts/bulk_query",
      Some(json!(["S1", "S2"])),
    )
    .await;
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

    let resp = send(&app, "DELETE", "/custom_scripts/S1", None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&app, "GET", "/custom_scripts/S1", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
