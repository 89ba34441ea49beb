use std::time::Duration;

use thiserror::Error;
use threadbox_utils::ThreadboxUtilsError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a threadbox-related operation.
pub type ThreadboxResult<T> = Result<T, ThreadboxError>;

/// An error that occurred during a threadbox operation.
#[derive(Debug, Error)]
pub enum ThreadboxError {
    /// A permission string failed validation.
    #[error("invalid permission: {0:?}")]
    InvalidPermission(String),

    /// A provider declares permissions that cannot be granted together.
    #[error("conflicting permissions for provider {provider_id}: {reason}")]
    ConflictingPermissions {
        /// The provider declaring the permissions.
        provider_id: String,

        /// What conflicts.
        reason: String,
    },

    /// A provider manifest could not be used.
    #[error("invalid provider manifest {path}: {reason}")]
    InvalidManifest {
        /// Where the manifest was read from.
        path: String,

        /// Why it was rejected.
        reason: String,
    },

    /// A provider id is registered twice.
    #[error("thread provider already registered: {0}")]
    ProviderAlreadyRegistered(String),

    /// No provider is registered under the requested id.
    #[error("thread provider not found: {0}")]
    ProviderNotFound(String),

    /// Spawning a thread failed.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// The caller gave up waiting for a thread to be served.
    #[error("timed out after {0:?} waiting for thread to be served")]
    ServeTimeout(Duration),

    /// The orb named in a capability call does not exist.
    #[error("orb {0} not found")]
    OrbNotFound(i64),

    /// The sector named in a capability call does not exist.
    #[error("sector {0} not found")]
    SectorNotFound(i64),

    /// The scoping tuple of a capability call does not match the orb's real sector and chain.
    #[error("orb {orb_id} does not belong to sector {sector_id} on chain {chain}")]
    OwnershipMismatch {
        /// The orb named by the caller.
        orb_id: i64,

        /// The sector named by the caller.
        sector_id: i64,

        /// The chain named by the caller.
        chain: String,
    },

    /// The caller holds no wallet grant covering the operation.
    #[error("wallet operation `{operation}` is not granted to this thread")]
    AccessDenied {
        /// The refused operation.
        operation: String,
    },

    /// A wallet operation has no implementation for the chain.
    #[error("wallet operation `{operation}` is not implemented for chain {chain}")]
    NotImplemented {
        /// The operation that was requested.
        operation: String,

        /// The chain it was requested on.
        chain: String,
    },

    /// A chain wallet service failed.
    #[error("wallet service error: {0}")]
    Wallet(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML (de)serialization error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An error from threadbox-utils.
    #[error(transparent)]
    Utils(#[from] ThreadboxUtilsError),
}

/// An error raised while spawning a thread.
///
/// Concurrent callers waiting on the same spawn all receive a copy of the same failure, so
/// this type is `Clone` and carries only rendered messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// Every port in the configured range is taken.
    #[error("no free port in range {start}-{end}")]
    PortsExhausted {
        /// First port of the range.
        start: u16,

        /// End of the range (exclusive).
        end: u16,
    },

    /// The descriptor could not be generated.
    #[error("descriptor generation failed: {0}")]
    Descriptor(String),

    /// Support files could not be written.
    #[error("failed to prepare thread files: {0}")]
    Prepare(String),

    /// The runtime process could not be started.
    #[error("failed to launch thread runtime: {0}")]
    Launch(String),

    /// The runtime exited before it started listening.
    #[error("thread runtime exited before becoming ready on port {port}")]
    Exited {
        /// The port the runtime was bound to.
        port: u16,
    },

    /// The runtime did not accept connections in time.
    #[error("thread runtime on port {port} not ready after {timeout:?}")]
    NotReady {
        /// The port the runtime was bound to.
        port: u16,

        /// How long readiness was awaited.
        timeout: Duration,
    },

    /// The registry is shutting down.
    #[error("process registry is shut down")]
    ShutDown,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ThreadboxError {
    /// Whether retrying the same call can never succeed.
    ///
    /// Validation, ownership and unimplemented-operation errors are permanent; spawn
    /// failures, timeouts, and I/O or database errors may clear up on their own.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ThreadboxError::InvalidPermission(_)
                | ThreadboxError::ConflictingPermissions { .. }
                | ThreadboxError::InvalidManifest { .. }
                | ThreadboxError::ProviderAlreadyRegistered(_)
                | ThreadboxError::ProviderNotFound(_)
                | ThreadboxError::OrbNotFound(_)
                | ThreadboxError::SectorNotFound(_)
                | ThreadboxError::OwnershipMismatch { .. }
                | ThreadboxError::AccessDenied { .. }
                | ThreadboxError::NotImplemented { .. }
                | ThreadboxError::Spawn(SpawnError::Descriptor(_))
        )
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
