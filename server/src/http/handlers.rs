use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{Map, Value};
use shared_types::{ConfigurationRecord, Envelope, HistoryEntry};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    dto::{parse_patch, parse_version, ResolvedParams, SAVED_MESSAGE},
    error::{ApiError, ApiResult},
    state::AppState,
};
use crate::auth::Principal;
use crate::resolver;

/// GET /config
/// Every configuration record
#[instrument(skip(state))]
pub async fn list_configs(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Envelope<Vec<ConfigurationRecord>>>> {
    let records = state.cache.get_all().await?;
    Ok(Json(Envelope::data(records)))
}

/// GET /config/json?country=XX
/// Name -> resolved value, with the country's overrides applied
#[instrument(skip(state))]
pub async fn resolved_configs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolvedParams>,
) -> ApiResult<Json<Map<String, Value>>> {
    let records = state.cache.get_all().await?;
    Ok(Json(resolver::resolve_all(
        &records,
        params.country.as_deref(),
    )))
}

/// GET /config/:name
#[instrument(skip(state))]
pub async fn get_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Envelope<ConfigurationRecord>>> {
    let record = state
        .cache
        .get_by_name(&name)
        .await?
        .ok_or_else(|| ApiError::config_not_found(&name))?;

    Ok(Json(Envelope::data(record)))
}

/// POST /config/:name
/// Create or update a configuration
#[instrument(skip(state, principal, body), fields(uid = %principal.uid))]
pub async fn set_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Extension(principal): Extension<Principal>,
    body: Bytes,
) -> ApiResult<Json<Envelope<ConfigurationRecord>>> {
    let patch = parse_patch(&body)?;
    info!("Saving configuration: {}", name);

    let record = state.cache.set(&name, patch, &principal.uid).await?;
    Ok(Json(Envelope::data_with_message(record, SAVED_MESSAGE)))
}

/// DELETE /config/:name
#[instrument(skip(state, principal), fields(uid = %principal.uid))]
pub async fn delete_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<StatusCode> {
    info!("Deleting configuration: {}", name);

    if state.cache.delete(&name).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::config_not_found(&name))
    }
}

/// GET /config/:name/country/:country
/// The record as one country sees it
#[instrument(skip(state))]
pub async fn get_config_for_country(
    State(state): State<Arc<AppState>>,
    Path((name, country)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<Map<String, Value>>>> {
    let view = state
        .repository
        .get_for_country(&name, &country)
        .await?
        .ok_or_else(|| ApiError::config_not_found(&name))?;

    Ok(Json(Envelope::data(view)))
}

/// GET /config/:name/history
/// Archived snapshots, oldest first. Survives deletion of the configuration.
#[instrument(skip(state))]
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Envelope<Vec<HistoryEntry>>>> {
    let entries = state.repository.history(&name).await?;
    Ok(Json(Envelope::data(entries)))
}

/// GET /config/:name/history/:version
#[instrument(skip(state))]
pub async fn get_history_entry(
    State(state): State<Arc<AppState>>,
    Path((name, version)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<HistoryEntry>>> {
    let number = parse_version(&version)?;
    let entry = state
        .repository
        .history_entry(&name, number)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Version {number} of configuration '{name}' not found"
            ))
        })?;

    Ok(Json(Envelope::data(entry)))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "remote-config",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
