use thiserror::Error;
use threadbox_core::{rpc::JsonRpcError, ThreadboxError};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of an extension call.
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// An error raised by an extension.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The host could not be reached.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The host answered the call with a JSON-RPC error.
    #[error("rpc error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The host answered with something that is not a valid response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The binding does not grant the operation.
    #[error("operation `{operation}` is not granted by this binding")]
    NotGranted {
        /// The refused operation.
        operation: String,
    },

    /// The thread environment is incomplete.
    #[error("environment error: {0}")]
    Environment(String),

    /// The descriptor could not be loaded.
    #[error(transparent)]
    Descriptor(#[from] ThreadboxError),

    /// A JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExtensionError {
    /// The JSON-RPC error code, when the host rejected the call.
    pub fn rpc_code(&self) -> Option<i32> {
        match self {
            ExtensionError::Rpc(error) => Some(error.code),
            _ => None,
        }
    }
}
