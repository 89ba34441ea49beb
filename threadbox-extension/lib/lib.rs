//! `threadbox-extension` runs inside a thread and gives its program the capabilities the
//! descriptor bound, and nothing else.
//!
//! Each extension is built from one binding of the thread's descriptor. It fills in the
//! scoping parameters recorded in the binding, sends the call to the host over JSON-RPC,
//! and unwraps the result. A thread whose descriptor has no wallet binding simply has no
//! [`WalletExtension`].
//!
//! ```no_run
//! # async fn run() -> threadbox_extension::ExtensionResult<()> {
//! use threadbox_extension::ThreadEnv;
//!
//! let env = ThreadEnv::from_env()?;
//! if let Some(storage) = env.storage()? {
//!     let state = storage.get().await?;
//!     storage.set(&serde_json::json!({ "seen": state.is_some() })).await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod client;
mod env;
mod error;
mod storage;
mod wallet;

#[cfg(test)]
mod testing;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use client::*;
pub use env::*;
pub use error::*;
pub use storage::*;
pub use wallet::*;
