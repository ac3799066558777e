mod api;
mod pages;

pub use api::{codes, download_pdf, download_snapshot, ExportError};
pub use pages::{index, login_page, login_submit, logout, preview};

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/preview", post(preview))
        .route("/download", post(download_pdf))
        .route("/api/export/snapshot", post(download_snapshot))
        .route("/api/codes", post(codes))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", post(logout))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_session,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
