use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, jobs, middleware::auth_middleware, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Submissions require credentials
    let submit_routes = Router::new()
        .route("/trim", post(jobs::submit_trim))
        .route("/concat", post(jobs::submit_concat))
        .route("/merge-audio", post(jobs::submit_merge_audio))
        .route("/add-subtitles", post(jobs::submit_subtitles))
        .route("/process", post(jobs::submit_composite))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Status, health and metrics are open
    let read_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/tasks", get(jobs::list_jobs))
        .route("/tasks/{job_id}", get(jobs::get_job));

    Router::new()
        .merge(submit_routes)
        .merge(read_routes)
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
