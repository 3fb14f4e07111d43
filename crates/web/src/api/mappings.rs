//! Mapping endpoints: create, extend, and the two lookups.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, info};

use gref_core::models::{Mapping, Mappings};

use super::status::{http_status, AppError};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct CreateRequest {
    source: String,
    source_id: String,
    #[serde(default)]
    canonical: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    source: String,
    source_id: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:object_type", post(create_mapping))
        .route(
            "/:object_type/:canonical",
            get(canonical_info).put(update_mapping),
        )
        .route("/:object_type/:source/:source_id", get(source_info))
}

fn check_object_type(state: &AppState, object_type: &str) -> Result<(), AppError> {
    if state.config.registry.object_types.iter().any(|t| t == object_type) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "unknown object type '{object_type}'"
        )))
    }
}

fn check_source(state: &AppState, source: &str, source_id: &str) -> Result<(), AppError> {
    if !state.config.registry.sources.iter().any(|s| s == source) {
        return Err(AppError::BadRequest(format!("unknown source '{source}'")));
    }
    if source_id.trim().is_empty() {
        return Err(AppError::BadRequest("source_id must not be empty".into()));
    }
    Ok(())
}

async fn create_mapping(
    State(state): State<Arc<AppState>>,
    Path(object_type): Path<String>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<Mapping>), AppError> {
    check_object_type(&state, &object_type)?;
    check_source(&state, &req.source, &req.source_id)?;

    let mut mapping = Mapping::for_source(object_type, req.source, req.source_id);
    mapping.canonical = req.canonical.unwrap_or_default();

    let status = state.backend.map_create(&mut mapping).await?;
    mapping.object = mapping.object_url(state.base_url());

    info!(
        object_type = %mapping.object_type,
        source = %mapping.source,
        canonical = %mapping.canonical,
        status = %status,
        "create request handled"
    );
    Ok((http_status(status), Json(mapping)))
}

async fn update_mapping(
    State(state): State<Arc<AppState>>,
    Path((object_type, canonical)): Path<(String, String)>,
    Json(req): Json<UpdateRequest>,
) -> Result<Response, AppError> {
    check_object_type(&state, &object_type)?;
    check_source(&state, &req.source, &req.source_id)?;

    let mut mapping = Mapping::for_canonical(object_type, canonical);
    mapping.source = req.source;
    mapping.source_id = req.source_id;

    let (message, status) = state.backend.map_update(&mapping).await?;
    let code = http_status(status);
    if code == StatusCode::NO_CONTENT {
        return Ok(code.into_response());
    }
    Ok((code, Json(serde_json::json!({ "message": message }))).into_response())
}

async fn source_info(
    State(state): State<Arc<AppState>>,
    Path((object_type, source, source_id)): Path<(String, String, String)>,
) -> Result<Json<Mapping>, AppError> {
    check_object_type(&state, &object_type)?;
    check_source(&state, &source, &source_id)?;

    let mut mapping = Mapping::for_source(object_type, source, source_id);
    state.backend.source_info(&mut mapping).await?;
    mapping.object = mapping.object_url(state.base_url());
    debug!(canonical = %mapping.canonical, "source resolved");
    Ok(Json(mapping))
}

async fn canonical_info(
    State(state): State<Arc<AppState>>,
    Path((object_type, canonical)): Path<(String, String)>,
) -> Result<Json<Mappings>, AppError> {
    check_object_type(&state, &object_type)?;

    let lookup = Mapping::for_canonical(object_type, canonical);
    let (mappings, _) = state
        .backend
        .canonical_info(&lookup, state.base_url())
        .await?;
    Ok(Json(mappings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use gref_core::backend::{Backend, RelationalBackend, Vocabulary};
    use gref_core::config::{AppConfig, RelationalConfig};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let config = AppConfig::default();
        let mut backend = RelationalBackend::new(
            RelationalConfig {
                path: ":memory:".into(),
            },
            Vocabulary::new(
                config.registry.sources.clone(),
                config.registry.object_types.clone(),
            ),
        );
        backend.boot().await.unwrap();
        let state = Arc::new(AppState {
            backend: Arc::new(backend),
            config,
        });
        crate::router(state)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_ping_names_backend() {
        let app = test_app().await;
        let (status, body) = send(&app, "GET", "/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backend"], "relational");
    }

    #[tokio::test]
    async fn test_create_then_conflict_returns_stored_canonical() {
        let app = test_app().await;
        let (status, first) = send(
            &app,
            "POST",
            "/person",
            Some(json!({"source": "salesforce", "source_id": "SF-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let canonical = first["canonical"].as_str().unwrap().to_string();
        assert!(!canonical.is_empty());
        assert_eq!(
            first["object"],
            format!("http://localhost:8080/person/{canonical}")
        );

        let (status, second) = send(
            &app,
            "POST",
            "/person",
            Some(json!({"source": "salesforce", "source_id": "SF-1", "canonical": "other"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(second["canonical"], canonical.as_str());
    }

    #[tokio::test]
    async fn test_update_and_lookups() {
        let app = test_app().await;
        let (_, created) = send(
            &app,
            "POST",
            "/person",
            Some(json!({"source": "salesforce", "source_id": "SF-1", "canonical": "c-1"})),
        )
        .await;
        assert_eq!(created["canonical"], "c-1");

        let (status, body) = send(
            &app,
            "PUT",
            "/person/c-1",
            Some(json!({"source": "zuora", "source_id": "Z-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "mapping successfully updated");

        let (status, found) = send(&app, "GET", "/person/zuora/Z-1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["canonical"], "c-1");

        let (status, list) = send(&app, "GET", "/person/c-1", None).await;
        assert_eq!(status, StatusCode::OK);
        let mut sources: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["source"].as_str().unwrap())
            .collect();
        sources.sort();
        assert_eq!(sources, vec!["salesforce", "zuora"]);
    }

    #[tokio::test]
    async fn test_missing_entities_are_not_found() {
        let app = test_app().await;
        let (status, body) = send(&app, "GET", "/person/salesforce/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        let (status, _) = send(
            &app,
            "PUT",
            "/person/ghost",
            Some(json!({"source": "zuora", "source_id": "Z-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_names_are_bad_requests() {
        let app = test_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/widget",
            Some(json!({"source": "salesforce", "source_id": "SF-1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("widget"));

        let (status, _) = send(
            &app,
            "POST",
            "/person",
            Some(json!({"source": "crm", "source_id": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/person/crm/1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
