//! Batch submission and job status handlers.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use playlister_core::{
    job::parse_batch,
    status::{query_status, StatusSelector, StatusStats},
    DispatchError, JobRecord, JobState,
};

use super::handlers::{error_response, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub message: String,
    pub filename: Option<String>,
    pub session_id: String,
    pub job_ids: Vec<String>,
    pub total_jobs: usize,
    /// Rows dropped for a missing profile id or keyword.
    pub rejected_rows: usize,
    pub max_workers: usize,
}

/// Query parameters for the status endpoint. `job_ids` is comma separated.
#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub session_id: Option<String>,
    pub job_ids: Option<String>,
}

/// One job as reported to clients.
#[derive(Debug, Serialize)]
pub struct JobStatusEntry {
    pub job_id: String,
    pub status: JobState,
    pub profile_id: Option<String>,
    pub keyword: Option<String>,
    pub name: Option<String>,
    pub error: Option<String>,
}

impl From<JobRecord> for JobStatusEntry {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.job_id,
            status: record.state,
            profile_id: record.resource_key,
            keyword: record.search_term,
            name: record.name,
            error: record.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub jobs: Vec<JobStatusEntry>,
    pub stats: StatusStats,
}

// ============================================================================
// Handlers
// ============================================================================

/// Queue a batch of rows for background processing
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(payload) =
        payload.map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))?;

    let request = parse_batch(&payload, &state.intake_defaults())
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;

    let submission = state
        .dispatcher()
        .submit_batch(request.specs, request.concurrency)
        .await
        .map_err(dispatch_error)?;

    Ok(Json(BatchResponse {
        success: true,
        message: format!("Queued {} jobs, running in background", submission.accepted),
        filename: request.filename,
        session_id: submission.session_id,
        total_jobs: submission.accepted,
        job_ids: submission.job_ids,
        rejected_rows: request.rejected_rows + submission.rejected,
        max_workers: submission.concurrency,
    }))
}

/// Status of the jobs of a session, or of an explicit id list
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> Result<Json<StatusResponse>, ApiError> {
    let selector = match (params.session_id, params.job_ids) {
        (Some(session_id), _) if !session_id.trim().is_empty() => {
            StatusSelector::Session(session_id.trim().to_string())
        }
        (_, Some(ids)) if !ids.trim().is_empty() => StatusSelector::Jobs(
            ids.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "missing session_id or job_ids",
            ))
        }
    };

    let report = query_status(state.status_store(), &selector).map_err(|e| {
        error!("Status query failed: {}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(StatusResponse {
        success: true,
        jobs: report.jobs.into_iter().map(JobStatusEntry::from).collect(),
        stats: report.stats,
    }))
}

pub(crate) fn dispatch_error(e: DispatchError) -> ApiError {
    match e {
        DispatchError::Validation(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        DispatchError::Status(e) => {
            error!("Failed to seed job status: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
