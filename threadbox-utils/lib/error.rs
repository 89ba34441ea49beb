use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a threadbox-utils related operation.
pub type ThreadboxUtilsResult<T> = Result<T, ThreadboxUtilsError>;

/// An error that occurred during a threadbox-utils operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ThreadboxUtilsError {
    /// An I/O error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// An environment variable holds a value that cannot be used.
    #[error("invalid value for {name}: {reason}")]
    InvalidEnvValue {
        /// The name of the environment variable.
        name: String,

        /// Why the value was rejected.
        reason: String,
    },
}
