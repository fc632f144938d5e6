use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_size as usize;

    let mut router = Router::new()
        // Files
        .route("/files", get(handlers::list_files))
        .route(
            "/files",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files", delete(handlers::delete_file))
        .route(
            "/files/batch",
            post(handlers::upload_files).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/delete", post(handlers::delete_files))
        .route(
            "/files/replace",
            post(handlers::replace_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/files/link", get(handlers::get_signed_link))
        // Folders
        .route("/folders/move", post(handlers::move_folder))
        .route("/folders/copy", post(handlers::copy_folder))
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Admin-only routes
    if state.config.admin_mode {
        tracing::warn!("Admin mode enabled — bucket admin routes are available.");
        router = router
            .route("/admin/buckets", get(handlers::list_buckets))
            .route("/admin/buckets", post(handlers::create_bucket))
            .route("/admin/buckets/:name", delete(handlers::delete_bucket))
            .route("/admin/buckets/:name/empty", post(handlers::empty_bucket));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
