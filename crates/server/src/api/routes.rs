use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, jobs, middleware::metrics_middleware, profiles};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Jobs
        .route("/jobs/batch", post(jobs::submit_batch))
        .route("/jobs/status", get(jobs::get_status))
        // Profiles
        .route("/profiles/run", post(profiles::run_profile))
        .route("/profiles/import", post(profiles::import_profiles))
        .route("/profiles/controller", get(profiles::controller_profiles))
        // Reporting
        .route("/dashboard/stats", get(profiles::dashboard_stats))
        .route("/report", get(profiles::report))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
