//! `threadbox-utils` is a library containing general utilities for the threadbox project.

#![warn(missing_docs)]

pub mod defaults;
pub mod env;
pub mod error;
pub mod term;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use env::*;
pub use error::*;
pub use term::*;
