use thiserror::Error;
use threadbox_core::ThreadboxError;
use threadbox_utils::ThreadboxUtilsError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a threadbox-cli related operation.
pub type ThreadboxCliResult<T> = Result<T, ThreadboxCliError>;

/// An error that occurred while running a threadbox binary.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ThreadboxCliError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A threadbox core error.
    #[error(transparent)]
    Threadbox(#[from] ThreadboxError),

    /// A threadbox utils error.
    #[error(transparent)]
    Utils(#[from] ThreadboxUtilsError),

    /// The sandbox runtime could not be found.
    #[error("runtime executable not found: {0}")]
    RuntimeNotFound(String),

    /// The logging filter could not be parsed.
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
}
