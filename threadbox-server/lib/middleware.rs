//! Middleware of the threadbox server: request logging and the loopback guard.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::ServerError;

//--------------------------------------------------------------------------------------------------
// Middleware Functions
//--------------------------------------------------------------------------------------------------

/// Rejects every request whose peer is not on the local host, before it reaches a handler.
///
/// A request without a known peer address is rejected as well.
pub async fn localhost_only(req: Request<Body>, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match peer {
        Some(addr) if is_local(&addr) => next.run(req).await,
        Some(addr) => {
            ServerError::Forbidden(format!("{} is not a local caller", addr.ip())).into_response()
        }
        None => ServerError::Forbidden("unknown caller".to_string()).into_response(),
    }
}

/// Log incoming requests
pub async fn logging_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    tracing::info!("Request: {} {}", method, uri);

    let response = next.run(req).await;

    tracing::info!("Response: {} {}: {}", method, uri, response.status());

    response
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Whether `addr` is a loopback address, counting IPv4-mapped IPv6 ones.
pub fn is_local(addr: &SocketAddr) -> bool {
    addr.ip().to_canonical().is_loopback()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local() {
        for local in ["127.0.0.1:1", "127.10.0.3:1", "[::1]:1", "[::ffff:127.0.0.1]:1"] {
            assert!(is_local(&local.parse().unwrap()), "{}", local);
        }
        for remote in ["10.0.0.1:1", "192.168.1.20:1", "[2001:db8::1]:1", "[::ffff:8.8.8.8]:1"] {
            assert!(!is_local(&remote.parse().unwrap()), "{}", remote);
        }
    }
}
