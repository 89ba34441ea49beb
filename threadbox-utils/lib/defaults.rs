//! Default values shared across the threadbox crates.

use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
    sync::LazyLock,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The loopback address every threadbox socket binds to.
pub const LOCALHOST_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// The default port of the host server exposing the RPC endpoint.
pub const DEFAULT_SERVER_PORT: u16 = 5590;

/// The first port (inclusive) handed out to sandboxed threads.
pub const DEFAULT_THREAD_PORT_START: u16 = 9100;

/// The last port (exclusive) handed out to sandboxed threads.
pub const DEFAULT_THREAD_PORT_END: u16 = 9900;

/// How long a thread may stay unused before the reaper retires it.
pub const DEFAULT_THREAD_TTL_SECS: u64 = 30 * 60;

/// How often the reaper sweeps the process map.
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 5 * 60;

/// How long a freshly spawned thread has to start accepting connections.
pub const DEFAULT_READINESS_TIMEOUT_SECS: u64 = 10;

/// How long a caller waits for a thread to be served, spawn included.
pub const DEFAULT_SERVE_TIMEOUT_SECS: u64 = 30;

/// Grace period between SIGTERM and SIGKILL when stopping a thread.
pub const DEFAULT_TERMINATE_GRACE_MILLIS: u64 = 2_000;

/// Compatibility marker written into every generated descriptor.
pub const DEFAULT_COMPATIBILITY_DATE: &str = "2024-09-23";

/// Name of the runtime executable looked up on `PATH` when none is configured.
pub const DEFAULT_RUNTIME_EXE_NAME: &str = "workerd";

/// Arguments placed before the descriptor path when launching the runtime.
pub const DEFAULT_RUNTIME_ARGS: &[&str] = &["serve"];

/// The threadbox home directory name.
pub const THREADBOX_HOME_DIR: &str = ".threadbox";

/// The sub directory holding provider manifests.
pub const PROVIDERS_SUBDIR: &str = "providers";

/// The SQLite database file holding capability storage.
pub const STORE_DB_FILENAME: &str = "threadbox.db";

/// File name of the descriptor written into each thread's temp dir.
pub const DESCRIPTOR_FILENAME: &str = "thread.yaml";

/// File name of the program module written next to the descriptor.
pub const PROGRAM_FILENAME: &str = "main.js";

/// Prefix of the temp dirs allocated for threads.
pub const THREAD_TEMP_DIR_PREFIX: &str = "threadbox-";

/// The default threadbox home path.
pub static DEFAULT_THREADBOX_HOME: LazyLock<PathBuf> = LazyLock::new(|| {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(THREADBOX_HOME_DIR)
});
