use crate::errors::AppError;
use crate::extension;
use crate::handlers;
use crate::state::AppState;
use axum::{
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route("/api/projects/:id", delete(handlers::delete_project))
        .route(
            "/api/time-entries",
            get(handlers::list_entries).post(handlers::create_entry),
        )
        .route(
            "/api/time-entries/:id",
            put(handlers::update_entry).delete(handlers::delete_entry),
        )
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/data", get(handlers::get_data))
        .route("/api/export", get(handlers::export_data))
        .route("/api/reset", post(handlers::reset_data))
        .nest("/api/extension", extension::routes())
        .fallback(handlers::not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "handler panicked".to_string());
    AppError::Internal(message).into_response()
}
