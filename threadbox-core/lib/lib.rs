//! `threadbox-core` runs untrusted thread providers in isolated processes and hands them
//! nothing but the capabilities they declared.
//!
//! # Overview
//!
//! A thread provider is third-party integration code (a DEX, bridge, lending or
//! yield-farming venue) that trades on behalf of an orb. The host never trusts that code:
//! it runs in its own process, receives no credentials, and can only reach the storage and
//! wallet operations its permissions grant, by calling back into the host over RPC.
//!
//! # Architecture
//!
//! - **Permission model**: parsing and validation of `resource::scope[::identifier]` strings
//! - **Config hasher**: order-independent content hash used as the process cache key
//! - **Descriptor builder**: compiles a provider and its permissions into a runtime descriptor
//! - **Process registry**: spawns, reuses and evicts isolated processes, single-flight per hash
//! - **Idle reaper**: periodic sweep retiring processes unused past a TTL
//! - **Capability targets**: the storage and wallet operations served over RPC
//!
//! # Modules
//!
//! - [`config`] - Registry configuration
//! - [`descriptor`] - Runtime descriptor types and builder
//! - [`hash`] - Config hashing
//! - [`permission`] - Permission parsing and validation
//! - [`process`] - Process registry, launcher, port allocation and reaper
//! - [`provider`] - Thread provider types and catalog
//! - [`rpc`] - JSON-RPC wire format shared with the extension shim
//! - [`service`] - The `get_or_serve_thread` facade
//! - [`target`] - Storage and wallet capability targets

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod config;
pub mod descriptor;
pub mod hash;
pub mod permission;
pub mod process;
pub mod provider;
pub mod rpc;
pub mod service;
pub mod target;

pub use error::*;
