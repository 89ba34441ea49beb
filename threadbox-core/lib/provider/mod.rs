//! Thread providers and the catalog they are registered in.

mod catalog;

use std::{fmt, sync::Arc};

use getset::Getters;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use catalog::*;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// How the runtime loads a provider's program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// An ES module exporting a fetch handler.
    #[default]
    Module,

    /// A classic script registering its handler globally.
    Script,
}

/// The kind of venue a provider integrates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadType {
    /// Decentralized exchange.
    Dex,

    /// Cross-chain bridge.
    Bridge,

    /// Lending protocol.
    Lending,

    /// Yield farming venue.
    YieldFarming,
}

/// A registered thread provider. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder, Serialize, Deserialize)]
#[getset(get = "pub with_prefix")]
pub struct ThreadProvider {
    /// Stable provider id.
    #[builder(setter(into))]
    id: String,

    /// The program text executed in the sandbox.
    #[builder(setter(into))]
    source: String,

    /// How the program is loaded.
    #[builder(default)]
    execution_kind: ExecutionKind,

    /// The venue kind.
    thread_type: ThreadType,

    /// Declared permission strings, in declaration order.
    #[builder(default)]
    permissions: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Lookup of providers by id.
pub trait ProviderRegistry: Send + Sync {
    /// Returns the provider registered under `id`.
    fn get_provider(&self, id: &str) -> Option<Arc<ThreadProvider>>;
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ThreadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThreadType::Dex => "dex",
            ThreadType::Bridge => "bridge",
            ThreadType::Lending => "lending",
            ThreadType::YieldFarming => "yield_farming",
        };
        f.write_str(name)
    }
}
