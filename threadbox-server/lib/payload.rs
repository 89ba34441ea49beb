//! Request and response payloads of the admin API.
//!
//! The JSON-RPC payloads of the capability routes live in [`threadbox_core::rpc`] so the
//! in-thread extensions can share them; they are re-exported here.

use serde::{Deserialize, Serialize};
use threadbox_core::process::{CleanupStats, ThreadStatus};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use threadbox_core::rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
pub use threadbox_core::service::ThreadRequest;

//--------------------------------------------------------------------------------------------------
// Types: Responses
//--------------------------------------------------------------------------------------------------

/// Response type for regular message responses
#[derive(Debug, Serialize, Deserialize)]
pub struct RegularMessageResponse {
    /// Status message
    pub message: String,
}

/// Response of `POST /api/v1/threads/serve`
#[derive(Debug, Serialize, Deserialize)]
pub struct ServeThreadResponse {
    /// Loopback port of the thread
    pub port: u16,

    /// Base URL of the thread
    pub url: String,
}

/// Response of `GET /api/v1/threads`
#[derive(Debug, Serialize)]
pub struct ThreadListResponse {
    /// Ready threads, by port
    pub threads: Vec<ThreadStatus>,
}

/// Response of `POST /api/v1/threads/cleanup`
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    /// What the sweep did
    #[serde(flatten)]
    pub stats: CleanupStats,
}
