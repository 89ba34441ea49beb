//! Configuration of the threadbox server.
//!
//! The server always binds to the loopback interface. Everything it stores lives under the
//! threadbox home directory (`THREADBOX_HOME`, `~/.threadbox` by default).

use std::{net::SocketAddr, path::PathBuf};

use getset::Getters;
use threadbox_core::config::default_rpc_base_url;
use threadbox_utils::{
    env, DEFAULT_SERVER_PORT, LOCALHOST_IP, PROVIDERS_SUBDIR, STORE_DB_FILENAME,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Largest request body accepted by any route.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Config {
    /// Address to listen on, always loopback.
    addr: SocketAddr,

    /// Threadbox home directory.
    home_dir: PathBuf,

    /// SQLite store.
    db_path: PathBuf,

    /// Directory of provider manifests.
    providers_dir: PathBuf,

    /// Largest accepted request body.
    max_body_bytes: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Config {
    /// Creates a configuration. Unset values fall back to the environment, then defaults.
    pub fn new(
        port: Option<u16>,
        home_dir: Option<PathBuf>,
        providers_dir: Option<PathBuf>,
    ) -> Self {
        let home_dir = home_dir.unwrap_or_else(env::get_threadbox_home_path);
        let providers_dir = providers_dir.unwrap_or_else(|| home_dir.join(PROVIDERS_SUBDIR));

        Self {
            addr: SocketAddr::new(LOCALHOST_IP, port.unwrap_or(DEFAULT_SERVER_PORT)),
            db_path: home_dir.join(STORE_DB_FILENAME),
            providers_dir,
            home_dir,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Base URL of the RPC routes, as threads must call them.
    pub fn rpc_base_url(&self) -> String {
        default_rpc_base_url(self.addr.port())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_loopback_and_derives_paths() {
        let config = Config::new(Some(6123), Some(PathBuf::from("/srv/threadbox")), None);

        assert!(config.get_addr().ip().is_loopback());
        assert_eq!(config.get_addr().port(), 6123);
        assert_eq!(config.get_db_path(), &PathBuf::from("/srv/threadbox/threadbox.db"));
        assert_eq!(
            config.get_providers_dir(),
            &PathBuf::from("/srv/threadbox/providers")
        );
        assert_eq!(config.rpc_base_url(), "http://127.0.0.1:6123/rpc");
    }
}
