//! Router configuration for the threadbox server.
//!
//! Routes:
//! - `POST /rpc/storage`, `POST /rpc/wallet`: capability JSON-RPC, called by threads
//! - `GET /api/v1/health`
//! - `GET /api/v1/threads`, `POST /api/v1/threads/serve`, `POST /api/v1/threads/cleanup`
//!
//! Every route sits behind the loopback guard.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::{handler, middleware as app_middleware, state::AppState};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Create a new router with the given state
pub fn create_router(state: AppState) -> Router {
    let max_body_bytes = *state.get_config().get_max_body_bytes();

    let rest_api = Router::new()
        .route("/health", get(handler::health))
        .route("/threads", get(handler::list_threads))
        .route("/threads/serve", post(handler::serve_thread))
        .route("/threads/cleanup", post(handler::cleanup_threads));

    let rpc_api = Router::new()
        .route("/storage", post(handler::storage_rpc))
        .route("/wallet", post(handler::wallet_rpc));

    Router::new()
        .nest("/api/v1", rest_api)
        .nest("/rpc", rpc_api)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(middleware::from_fn(app_middleware::localhost_only))
        .layer(middleware::from_fn(app_middleware::logging_middleware))
        .with_state(state)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
