//! Configuration of the process registry and its reaper.
//!
//! Every value has a default and can be overridden through a `THREADBOX_*` environment
//! variable (see [`RegistryConfig::from_env`]) or set explicitly through the builder.

use std::{path::PathBuf, time::Duration};

use getset::Getters;
use threadbox_utils::{
    env, DEFAULT_COMPATIBILITY_DATE, DEFAULT_READINESS_TIMEOUT_SECS, DEFAULT_REAPER_INTERVAL_SECS,
    DEFAULT_RUNTIME_ARGS, DEFAULT_RUNTIME_EXE_NAME, DEFAULT_SERVE_TIMEOUT_SECS,
    DEFAULT_SERVER_PORT, DEFAULT_TERMINATE_GRACE_MILLIS, DEFAULT_THREAD_PORT_END,
    DEFAULT_THREAD_PORT_START, DEFAULT_THREAD_TTL_SECS, LOCALHOST_IP,
};
use typed_builder::TypedBuilder;

use crate::ThreadboxResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Settings of the [`ProcessRegistry`](crate::process::ProcessRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Getters, TypedBuilder)]
#[getset(get = "pub with_prefix")]
pub struct RegistryConfig {
    /// How long a ready thread may sit unused before the reaper retires it.
    #[builder(default = Duration::from_secs(DEFAULT_THREAD_TTL_SECS))]
    thread_ttl: Duration,

    /// How often the reaper runs.
    #[builder(default = Duration::from_secs(DEFAULT_REAPER_INTERVAL_SECS))]
    reaper_interval: Duration,

    /// Ports handed to threads, start inclusive, end exclusive.
    #[builder(default = (DEFAULT_THREAD_PORT_START, DEFAULT_THREAD_PORT_END))]
    port_range: (u16, u16),

    /// How long a freshly launched runtime has to start accepting connections.
    #[builder(default = Duration::from_secs(DEFAULT_READINESS_TIMEOUT_SECS))]
    readiness_timeout: Duration,

    /// How long a caller of `get_or_serve_thread` waits before giving up.
    #[builder(default = Duration::from_secs(DEFAULT_SERVE_TIMEOUT_SECS))]
    serve_timeout: Duration,

    /// Time between SIGTERM and SIGKILL when stopping a runtime.
    #[builder(default = Duration::from_millis(DEFAULT_TERMINATE_GRACE_MILLIS))]
    terminate_grace: Duration,

    /// Compatibility marker written into every descriptor.
    #[builder(default = DEFAULT_COMPATIBILITY_DATE.to_string(), setter(into))]
    compatibility_date: String,

    /// The isolation runtime executable.
    #[builder(default = PathBuf::from(DEFAULT_RUNTIME_EXE_NAME), setter(into))]
    runtime_exe: PathBuf,

    /// Arguments placed before the descriptor path.
    #[builder(default = DEFAULT_RUNTIME_ARGS.iter().map(|arg| arg.to_string()).collect())]
    runtime_args: Vec<String>,

    /// Base URL of the host RPC routes, as seen from inside a thread.
    #[builder(default = default_rpc_base_url(DEFAULT_SERVER_PORT), setter(into))]
    rpc_base_url: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RegistryConfig {
    /// Loads the configuration from `THREADBOX_*` environment variables, falling back to the
    /// defaults for unset ones. Malformed values are an error, not silently ignored.
    pub fn from_env() -> ThreadboxResult<Self> {
        let runtime_exe = std::env::var(env::RUNTIME_EXE_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RUNTIME_EXE_NAME));

        let compatibility_date = std::env::var(env::COMPATIBILITY_DATE_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_COMPATIBILITY_DATE.to_string());

        Ok(Self::builder()
            .thread_ttl(env::parse_env_secs_or(
                env::THREAD_TTL_ENV_VAR,
                DEFAULT_THREAD_TTL_SECS,
            )?)
            .reaper_interval(env::parse_env_secs_or(
                env::REAPER_INTERVAL_ENV_VAR,
                DEFAULT_REAPER_INTERVAL_SECS,
            )?)
            .port_range(env::parse_env_port_range_or(
                env::PORT_RANGE_ENV_VAR,
                (DEFAULT_THREAD_PORT_START, DEFAULT_THREAD_PORT_END),
            )?)
            .readiness_timeout(env::parse_env_secs_or(
                env::READINESS_TIMEOUT_ENV_VAR,
                DEFAULT_READINESS_TIMEOUT_SECS,
            )?)
            .serve_timeout(env::parse_env_secs_or(
                env::SERVE_TIMEOUT_ENV_VAR,
                DEFAULT_SERVE_TIMEOUT_SECS,
            )?)
            .compatibility_date(compatibility_date)
            .runtime_exe(runtime_exe)
            .build())
    }

    /// Returns a copy pointing threads at the RPC routes of a server on `port`.
    pub fn with_server_port(mut self, port: u16) -> Self {
        self.rpc_base_url = default_rpc_base_url(port);
        self
    }

    /// Returns a copy using a different runtime executable.
    pub fn with_runtime_exe(mut self, runtime_exe: impl Into<PathBuf>) -> Self {
        self.runtime_exe = runtime_exe.into();
        self
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The RPC base URL of a host server listening on loopback `port`.
pub fn default_rpc_base_url(port: u16) -> String {
    format!("http://{}:{}/rpc", LOCALHOST_IP, port)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn clear_env() {
        for name in [
            env::THREAD_TTL_ENV_VAR,
            env::REAPER_INTERVAL_ENV_VAR,
            env::PORT_RANGE_ENV_VAR,
            env::READINESS_TIMEOUT_ENV_VAR,
            env::SERVE_TIMEOUT_ENV_VAR,
            env::COMPATIBILITY_DATE_ENV_VAR,
            env::RUNTIME_EXE_ENV_VAR,
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() -> anyhow::Result<()> {
        clear_env();

        let config = RegistryConfig::from_env()?;
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(*config.get_thread_ttl(), Duration::from_secs(1800));
        assert_eq!(*config.get_reaper_interval(), Duration::from_secs(300));
        assert_eq!(*config.get_port_range(), (9100, 9900));
        assert_eq!(config.get_rpc_base_url(), "http://127.0.0.1:5590/rpc");
        Ok(())
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() -> anyhow::Result<()> {
        clear_env();
        std::env::set_var(env::THREAD_TTL_ENV_VAR, "60");
        std::env::set_var(env::PORT_RANGE_ENV_VAR, "12000-12010");
        std::env::set_var(env::RUNTIME_EXE_ENV_VAR, "/opt/runtime/bin/workerd");

        let config = RegistryConfig::from_env()?;
        assert_eq!(*config.get_thread_ttl(), Duration::from_secs(60));
        assert_eq!(*config.get_port_range(), (12000, 12010));
        assert_eq!(
            config.get_runtime_exe(),
            &PathBuf::from("/opt/runtime/bin/workerd")
        );

        std::env::set_var(env::SERVE_TIMEOUT_ENV_VAR, "soon");
        assert!(RegistryConfig::from_env().is_err());

        clear_env();
        Ok(())
    }

    #[test]
    fn test_with_server_port() {
        let config = RegistryConfig::default().with_server_port(6000);
        assert_eq!(config.get_rpc_base_url(), "http://127.0.0.1:6000/rpc");
    }
}
