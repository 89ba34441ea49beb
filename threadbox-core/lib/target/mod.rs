//! Capability targets: the host side of every storage and wallet call a thread can make.
//!
//! Targets are plain async services. The RPC routes in `threadbox-server` decode requests
//! and call into them; nothing here knows about HTTP.

mod db;
mod directory;
mod grant;
mod storage;
mod wallet;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use db::*;
pub use directory::*;
pub use grant::*;
pub use storage::*;
pub use wallet::*;
