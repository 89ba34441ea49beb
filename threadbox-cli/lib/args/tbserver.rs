use std::path::PathBuf;

use clap::Parser;
use threadbox_utils::{
    env::{RUNTIME_EXE_ENV_VAR, SERVER_PORT_ENV_VAR, THREADBOX_HOME_ENV_VAR},
    DEFAULT_SERVER_PORT,
};

use crate::styles;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Arguments for the tbserver command
#[derive(Debug, Parser)]
#[command(name = "tbserver", author, version, styles = styles::styles())]
pub struct TbserverArgs {
    /// Port number to listen on
    #[arg(long, env = SERVER_PORT_ENV_VAR, default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Threadbox home directory, holding the store and provider manifests
    #[arg(long = "home", env = THREADBOX_HOME_ENV_VAR)]
    pub home_dir: Option<PathBuf>,

    /// Directory of provider manifests, defaults to `<home>/providers`
    #[arg(short = 'p', long = "providers")]
    pub providers_dir: Option<PathBuf>,

    /// Runtime executable that hosts sandboxed threads
    #[arg(long = "runtime", env = RUNTIME_EXE_ENV_VAR)]
    pub runtime_exe: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log", default_value = "info")]
    pub log_filter: String,
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_args_are_well_formed() {
        TbserverArgs::command().debug_assert();
    }

    #[test]
    #[serial]
    fn test_args_parse_overrides() {
        let args = TbserverArgs::parse_from([
            "tbserver",
            "--port",
            "6000",
            "--providers",
            "/srv/providers",
            "--runtime",
            "/opt/workerd",
        ]);

        assert_eq!(args.port, 6000);
        assert_eq!(args.providers_dir, Some(PathBuf::from("/srv/providers")));
        assert_eq!(args.runtime_exe, Some(PathBuf::from("/opt/workerd")));
        assert_eq!(args.log_filter, "info");
    }
}
