//! Threadbox Server - the host side of the capability bridge.
//!
//! Serves the JSON-RPC routes threads call back into (`/rpc/storage`, `/rpc/wallet`) and a
//! small admin API over the thread registry (`/api/v1/...`). Every route answers loopback
//! callers only.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod payload;
pub mod route;
pub mod state;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use config::*;
pub use error::*;
pub use handler::*;
pub use middleware::*;
pub use payload::*;
pub use route::*;
pub use state::*;
