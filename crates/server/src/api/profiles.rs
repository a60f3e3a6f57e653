//! Profile handlers: single runs, controller import, reporting.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use playlister_core::{
    import_profiles as import_from_controller,
    job::normalize_target,
    recorder::{RecorderStats, ReportRow},
    ControllerProfile, ImportError, JobSpec, ProfileMetadata,
};

use super::handlers::{error_response, ApiError};
use super::jobs::dispatch_error;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for running one stored profile
#[derive(Debug, Deserialize)]
pub struct RunProfileBody {
    /// Recorder row id, as a number or numeric string
    pub profile_id: Option<Value>,
    pub keyword: Option<String>,
    pub playlist_title: Option<String>,
    pub target_total: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RunProfileResponse {
    pub success: bool,
    pub message: String,
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub created: usize,
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct ControllerProfilesResponse {
    pub success: bool,
    pub data: Vec<ControllerProfile>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStatsResponse {
    pub success: bool,
    pub stats: RecorderStats,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub rows: Vec<ReportRow>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Run the automation once for a profile already stored by the recorder
pub async fn run_profile(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RunProfileBody>, JsonRejection>,
) -> Result<Json<RunProfileResponse>, ApiError> {
    let Json(body) = body.map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))?;

    let profile_id = body
        .profile_id
        .as_ref()
        .and_then(parse_id)
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "missing profile_id"))?;
    let keyword = body
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "missing keyword"))?;

    let profile = state
        .recorder()
        .get_profile(profile_id)
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "profile not found"))?;

    let target = normalize_target(
        body.target_total.as_ref(),
        state.config().automation.default_target_count,
    );
    let mut spec = JobSpec::new(profile.natural_key.clone(), keyword)
        .with_target_count(target)
        .with_metadata(ProfileMetadata {
            name: Some(profile.name.clone()),
            raw_proxy: profile.raw_proxy.clone(),
            profile_path: profile.profile_path.clone(),
            browser_type: profile.browser_type.clone(),
            browser_version: profile.browser_version.clone(),
            note: profile.note.clone(),
        });
    spec.collection_name = body
        .playlist_title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    let job_id = state
        .dispatcher()
        .run_single(spec)
        .await
        .map_err(dispatch_error)?;
    info!(job_id = %job_id, profile = %profile.natural_key, "single profile run queued");

    Ok(Json(RunProfileResponse {
        success: true,
        message: format!("Started run for profile {}", profile.name),
        job_id,
    }))
}

/// Upsert every profile the controller knows about
pub async fn import_profiles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ImportResponse>, ApiError> {
    match import_from_controller(state.controller(), state.recorder()).await {
        Ok(summary) => Ok(Json(ImportResponse {
            success: true,
            message: format!("Imported {} profiles", summary.total()),
            created: summary.created,
            updated: summary.updated,
        })),
        Err(ImportError::Controller(e)) => {
            error!("Profile import could not reach the controller: {}", e);
            Err(error_response(
                StatusCode::BAD_GATEWAY,
                format!("controller request failed: {}", e),
            ))
        }
        Err(e @ ImportError::Persistence(_)) => {
            error!("Profile import failed: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Relay the controller's profile list
pub async fn controller_profiles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ControllerProfilesResponse>, ApiError> {
    let data = state.controller().list_profiles().await.map_err(|e| {
        error_response(
            StatusCode::BAD_GATEWAY,
            format!("controller request failed: {}", e),
        )
    })?;
    Ok(Json(ControllerProfilesResponse {
        success: true,
        data,
    }))
}

pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStatsResponse>, ApiError> {
    let stats = state
        .recorder()
        .stats()
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(DashboardStatsResponse {
        success: true,
        stats,
    }))
}

/// Done profiles and their collections, one row per collection
pub async fn report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReportResponse>, ApiError> {
    let rows = state
        .recorder()
        .report()
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(ReportResponse {
        success: true,
        rows,
    }))
}

fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(&json!(7)), Some(7));
        assert_eq!(parse_id(&json!(" 12 ")), Some(12));
        assert_eq!(parse_id(&json!("abc")), None);
        assert_eq!(parse_id(&json!(null)), None);
    }
}
