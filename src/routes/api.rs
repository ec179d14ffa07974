use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::{ApiError, DashboardError};
use crate::models::apps::{AppBookmark, AppCategory, AppPayload};
use crate::models::hosts::{HostPayload, HostProfile, HostsSnapshot};
use crate::models::views::{
    ConnectionTest, ContainerView, FormatMode, GlobalView, ResourceSnapshot, UnusedResources,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize, Default)]
pub struct HostQuery {
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DashboardQuery {
    #[serde(default)]
    pub mode: Option<FormatMode>,
}

/// The profile named by `?host=`, or the current one.
fn resolve_profile(state: &AppState, host: Option<&str>) -> Result<HostProfile, ApiError> {
    match host.map(str::trim).filter(|h| !h.is_empty()) {
        Some(id) => Ok(state.registry.get(id)?),
        None => Ok(state.registry.current()?),
    }
}

// --- Hosts ---

pub async fn handle_list_hosts(State(state): State<AppState>) -> Json<HostsSnapshot> {
    Json(state.registry.snapshot())
}

pub async fn handle_add_host(
    State(state): State<AppState>,
    Json(payload): Json<HostPayload>,
) -> Result<(StatusCode, Json<HostProfile>), ApiError> {
    let profile = state.registry.add(&payload)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn handle_update_host(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<HostPayload>,
) -> ApiResult<HostProfile> {
    let profile = state.registry.update(&id, &payload)?;
    state.aggregator.connector().invalidate(&id);
    Ok(Json(profile))
}

pub async fn handle_delete_host(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.registry.delete(&id)?;
    state.aggregator.connector().invalidate(&id);
    Ok(Json(json!({ "success": true, "message": format!("host {} deleted", id) })))
}

pub async fn handle_switch_host(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let previous = state.registry.switch(&id)?;
    let connector = state.aggregator.connector();
    connector.invalidate(&previous);
    connector.invalidate(&id);
    Ok(Json(json!({ "success": true, "current_host": id })))
}

pub async fn handle_test_saved_host(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ConnectionTest> {
    let profile = state.registry.get(&id)?;
    let result = state
        .aggregator
        .test_connection(&profile)
        .await
        .map_err(DashboardError::from)?;
    Ok(Json(result))
}

pub async fn handle_test_unsaved_host(
    State(state): State<AppState>,
    Json(payload): Json<HostPayload>,
) -> ApiResult<ConnectionTest> {
    let profile = payload.to_profile();
    if profile.address.is_empty() {
        return Err(ApiError::BadRequest("host address is required".to_string()));
    }
    let result = state
        .aggregator
        .test_connection(&profile)
        .await
        .map_err(DashboardError::from)?;
    Ok(Json(result))
}

// --- Containers ---

pub async fn handle_list_containers(
    State(state): State<AppState>,
    Query(q): Query<HostQuery>,
) -> ApiResult<Vec<ContainerView>> {
    let profile = resolve_profile(&state, q.host.as_deref())?;
    let views = state
        .aggregator
        .list_containers(&profile, FormatMode::Full)
        .await?;
    Ok(Json(views))
}

pub async fn handle_get_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<HostQuery>,
) -> ApiResult<ContainerView> {
    let profile = resolve_profile(&state, q.host.as_deref())?;
    Ok(Json(state.aggregator.container_detail(&profile, &id).await?))
}

pub async fn handle_container_stats(
    State(state): State<AppState>,
    Query(q): Query<HostQuery>,
) -> ApiResult<IndexMap<String, ResourceSnapshot>> {
    let profile = resolve_profile(&state, q.host.as_deref())?;
    Ok(Json(state.aggregator.bulk_stats(&profile).await?))
}

pub async fn handle_unused_resources(
    State(state): State<AppState>,
    Query(q): Query<HostQuery>,
) -> ApiResult<UnusedResources> {
    let profile = resolve_profile(&state, q.host.as_deref())?;
    Ok(Json(state.aggregator.unused_resources(&profile).await?))
}

pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(q): Query<DashboardQuery>,
) -> Json<GlobalView> {
    let profiles = state.registry.profiles();
    let mode = q.mode.unwrap_or(FormatMode::Full);
    Json(state.aggregator.aggregate(&profiles, mode).await)
}

// --- Apps ---

pub async fn handle_list_apps(State(state): State<AppState>) -> Json<Vec<AppBookmark>> {
    Json(state.apps.list())
}

pub async fn handle_apps_by_category(State(state): State<AppState>) -> Json<Vec<AppCategory>> {
    Json(state.apps.by_category())
}

pub async fn handle_get_app(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AppBookmark> {
    Ok(Json(state.apps.get(&id)?))
}

pub async fn handle_add_app(
    State(state): State<AppState>,
    Json(payload): Json<AppPayload>,
) -> Result<(StatusCode, Json<AppBookmark>), ApiError> {
    let app = state.apps.add(&payload)?;
    Ok((StatusCode::CREATED, Json(app)))
}

pub async fn handle_update_app(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AppPayload>,
) -> ApiResult<AppBookmark> {
    Ok(Json(state.apps.update(&id, &payload)?))
}

pub async fn handle_delete_app(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.apps.delete(&id)?;
    Ok(Json(json!({ "success": true })))
}

// --- Health ---

pub async fn handle_health(State(state): State<AppState>) -> Response {
    let profile = match state.registry.current() {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response();
        }
    };

    match state.aggregator.health(&profile).await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "docker": "connected",
            "host": profile.id,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "docker": "disconnected",
                "host": profile.id,
                "error": e.to_string(),
            })),
        )
            .into_response(),
    }
}
