//! Coffeehouse storefront library.
//!
//! A server-rendered storefront and admin console in front of the Coffeehouse
//! REST backend. All data lives on the backend; this crate renders it, holds
//! each visitor's bearer token in their session, and forwards their actions.
//!
//! The binary in `main.rs` only wires configuration, tracing and Sentry
//! around [`app`], so the whole HTTP surface can be driven from tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod navigation;
pub mod routes;
pub mod session;
pub mod state;

use axum::{Router, extract::Request, routing::get};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

/// Directory static assets are served from.
pub const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Build the storefront router with its middleware stack.
///
/// Layers run outermost first: tracing, request ID, security headers, CSP
/// nonce, then the session layer closest to the handlers.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::csp_nonce_middleware))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the backend.
async fn health() -> &'static str {
    "ok"
}
