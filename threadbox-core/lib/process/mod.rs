//! Lifecycle of sandboxed thread runtimes.
//!
//! The [`ProcessRegistry`] owns every running runtime, keyed by config hash. Runtimes are
//! started through a [`Launcher`], listen on a port handed out by the [`PortAllocator`], and
//! are retired by the [`IdleReaper`] once unused for longer than the configured TTL.

mod launcher;
mod port;
mod reaper;
mod registry;

#[cfg(test)]
pub(crate) mod testing;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use launcher::*;
pub use port::*;
pub use reaper::*;
pub use registry::*;
