use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use threadbox_core::{SpawnError, ThreadboxError};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a server operation.
pub type ServerResult<T> = Result<T, ServerError>;

/// An error returned by an admin route.
///
/// JSON-RPC routes never return this; their failures travel inside the JSON-RPC response.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request was malformed.
    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    /// The caller is not on the local host.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A threadbox operation failed.
    #[error(transparent)]
    Threadbox(#[from] ThreadboxError),

    /// An unexpected failure.
    #[error("internal error: {0}")]
    InternalError(String),
}

/// A request validation failure.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field has an invalid value.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    permanent: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ServerError {
    /// HTTP status of the error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::Threadbox(error) => match error {
                ThreadboxError::ProviderNotFound(_)
                | ThreadboxError::OrbNotFound(_)
                | ThreadboxError::SectorNotFound(_) => StatusCode::NOT_FOUND,
                ThreadboxError::ServeTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                ThreadboxError::Spawn(SpawnError::Descriptor(_)) => StatusCode::UNPROCESSABLE_ENTITY,
                ThreadboxError::Spawn(_) => StatusCode::SERVICE_UNAVAILABLE,
                ThreadboxError::AccessDenied { .. } => StatusCode::FORBIDDEN,
                ThreadboxError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
                error if error.is_permanent() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_permanent(&self) -> bool {
        match self {
            ServerError::ValidationError(_) | ServerError::Forbidden(_) => true,
            ServerError::Threadbox(error) => error.is_permanent(),
            ServerError::InternalError(_) => false,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::warn!("request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            permanent: self.is_permanent(),
        };

        (status, Json(body)).into_response()
    }
}
