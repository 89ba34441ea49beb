//! Runtime descriptors.
//!
//! A descriptor is the declarative document that drives the isolation runtime for one
//! sandboxed thread: which program to run, which loopback socket to listen on, which
//! extension modules to load, and which capability bindings to inject. It is the only place
//! capabilities are granted. A provider that did not declare a capability never receives a
//! binding for it, whatever its program tries to call.

mod builder;
mod types;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use builder::*;
pub use types::*;
