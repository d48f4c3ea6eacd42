//! HTTP route handlers.

pub mod broadcast;
pub mod status;

use std::sync::Arc;

use axum::http::{header, request, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Origin schemes allowed to call the API from a browser.
const EXTENSION_SCHEMES: [&str; 2] = ["chrome-extension://", "moz-extension://"];

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for browser-extension callers only. Web pages get no CORS headers,
/// so their preflights fail and they cannot read responses.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(is_extension_origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

fn is_extension_origin(origin: &HeaderValue, _parts: &request::Parts) -> bool {
    origin
        .to_str()
        .map(|o| EXTENSION_SCHEMES.iter().any(|scheme| o.starts_with(scheme)))
        .unwrap_or(false)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(broadcast::routes())
}
