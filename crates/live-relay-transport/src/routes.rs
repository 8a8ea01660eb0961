//! REST pass-through handlers.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use live_relay_core::PageRequest;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

/// Largest page the monitor API accepts.
const MAX_PER_PAGE: u32 = 100;

/// Service descriptor.
pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "live relay",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "monitor": "/monitor/{subject_id}/{channel_id}",
            "stats": "/monitor/{subject_id}/{channel_id}/stats",
            "history": "/monitor/{subject_id}/{channel_id}/history",
            "find_station": "/api/find-station/{subject_id}",
            "live": "/ws/monitor/{subject_id}/{channel_id}",
        }
    }))
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "live-relay" }))
}

/// Find the live broadcast of a subject, if any.
///
/// # Errors
/// Returns error if the station API is unreachable or answers non-2xx.
pub async fn find_station(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let station = state
        .client
        .station(&subject_id)
        .await
        .map_err(|e| ApiError::upstream("station lookup", e))?;

    let live = station
        .get("broad")
        .filter(|broad| is_truthy(broad))
        .and_then(|broad| {
            broad
                .get("broad_no")
                .filter(|no| is_truthy(no))
                .map(|no| (broad, no))
        });

    Ok(Json(match live {
        Some((broad, broad_no)) => json!({
            "success": true,
            "bj_id": subject_id,
            "station_id": broad_no,
            "is_live": true,
            "title": broad.get("broad_title").cloned().unwrap_or_else(|| json!("")),
            "category": broad.get("broad_cate_no").cloned().unwrap_or_else(|| json!("")),
        }),
        None => json!({
            "success": false,
            "bj_id": subject_id,
            "is_live": false,
            "message": "not currently broadcasting",
        }),
    }))
}

/// Query of the monitor listing.
#[derive(Debug, Deserialize)]
pub struct MonitorQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_per_page() -> u32 {
    20
}

impl MonitorQuery {
    fn validate(&self) -> Result<PageRequest, ApiError> {
        if self.page < 1 {
            return Err(ApiError::Validation("page must be at least 1".into()));
        }
        if !(1..=MAX_PER_PAGE).contains(&self.per_page) {
            return Err(ApiError::Validation(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(PageRequest {
            page: self.page,
            per_page: self.per_page,
        })
    }
}

/// Monitor listing of a broadcast.
///
/// # Errors
/// Returns error on invalid paging or upstream failure.
pub async fn monitor(
    State(state): State<AppState>,
    Path((subject_id, channel_id)): Path<(String, String)>,
    query: Result<Query<MonitorQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    let page = query.validate()?;
    state
        .client
        .monitor(&subject_id, &channel_id, page)
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream("monitor request", e))
}

/// Query of the stats endpoint.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// One of `donation_rank`, `chat_share`, `keywords`, `hourly`.
    pub stat_type: Option<String>,
}

/// Broadcast statistics.
///
/// # Errors
/// Returns error on upstream failure.
pub async fn stats(
    State(state): State<AppState>,
    Path((subject_id, channel_id)): Path<(String, String)>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Value>, ApiError> {
    state
        .client
        .stats(&subject_id, &channel_id, query.stat_type.as_deref())
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream("stats request", e))
}

/// Previous broadcast sessions.
///
/// # Errors
/// Returns error on upstream failure.
pub async fn history(
    State(state): State<AppState>,
    Path((subject_id, channel_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state
        .client
        .history(&subject_id, &channel_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::upstream("history request", e))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
