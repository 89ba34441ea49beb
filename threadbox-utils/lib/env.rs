//! Utility functions for working with environment variables.

use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::{ThreadboxUtilsError, ThreadboxUtilsResult, DEFAULT_THREADBOX_HOME};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable for the threadbox home directory
pub const THREADBOX_HOME_ENV_VAR: &str = "THREADBOX_HOME";

/// Environment variable for the port the threadbox server listens on
pub const SERVER_PORT_ENV_VAR: &str = "THREADBOX_SERVER_PORT";

/// Environment variable for the runtime executable that hosts sandboxed threads
pub const RUNTIME_EXE_ENV_VAR: &str = "THREADBOX_RUNTIME_EXE";

/// Environment variable for the idle TTL of a thread, in seconds
pub const THREAD_TTL_ENV_VAR: &str = "THREADBOX_THREAD_TTL_SECONDS";

/// Environment variable for the reaper sweep interval, in seconds
pub const REAPER_INTERVAL_ENV_VAR: &str = "THREADBOX_REAPER_INTERVAL_SECONDS";

/// Environment variable for the thread port range, written `start-end`
pub const PORT_RANGE_ENV_VAR: &str = "THREADBOX_PORT_RANGE";

/// Environment variable for the readiness timeout, in seconds
pub const READINESS_TIMEOUT_ENV_VAR: &str = "THREADBOX_READINESS_TIMEOUT_SECONDS";

/// Environment variable for the serve timeout, in seconds
pub const SERVE_TIMEOUT_ENV_VAR: &str = "THREADBOX_SERVE_TIMEOUT_SECONDS";

/// Environment variable for the compatibility date written into descriptors
pub const COMPATIBILITY_DATE_ENV_VAR: &str = "THREADBOX_COMPATIBILITY_DATE";

/// Environment variable the runtime passes to sandboxed code, naming its descriptor
pub const DESCRIPTOR_ENV_VAR: &str = "THREADBOX_DESCRIPTOR";

/// Environment variable the runtime passes to sandboxed code, naming its port
pub const THREAD_PORT_ENV_VAR: &str = "THREADBOX_PORT";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the path to the threadbox home directory.
/// If the THREADBOX_HOME environment variable is set, returns that path.
/// Otherwise, returns the default threadbox home path.
pub fn get_threadbox_home_path() -> PathBuf {
    if let Ok(threadbox_home) = std::env::var(THREADBOX_HOME_ENV_VAR) {
        PathBuf::from(threadbox_home)
    } else {
        DEFAULT_THREADBOX_HOME.to_owned()
    }
}

/// Reads and parses an environment variable, falling back to `default` when it is unset.
///
/// A variable that is set but does not parse is an error rather than a silent fallback.
pub fn parse_env_or<T>(name: &str, default: T) -> ThreadboxUtilsResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ThreadboxUtilsError::InvalidEnvValue {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

/// Reads a number of seconds from an environment variable.
pub fn parse_env_secs_or(name: &str, default_secs: u64) -> ThreadboxUtilsResult<Duration> {
    parse_env_or::<u64>(name, default_secs).map(Duration::from_secs)
}

/// Reads a `start-end` port range from an environment variable.
pub fn parse_env_port_range_or(
    name: &str,
    default: (u16, u16),
) -> ThreadboxUtilsResult<(u16, u16)> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(default);
    };

    let invalid = |reason: &str| ThreadboxUtilsError::InvalidEnvValue {
        name: name.to_string(),
        reason: format!("{reason}: {raw}"),
    };

    let (start, end) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| invalid("expected `start-end`"))?;
    let start = start
        .trim()
        .parse::<u16>()
        .map_err(|_| invalid("invalid start port"))?;
    let end = end
        .trim()
        .parse::<u16>()
        .map_err(|_| invalid("invalid end port"))?;

    if start >= end {
        return Err(invalid("empty port range"));
    }

    Ok((start, end))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_parse_env_or_default_and_value() {
        std::env::remove_var("THREADBOX_TEST_NUMBER");
        assert_eq!(parse_env_or("THREADBOX_TEST_NUMBER", 7u64).unwrap(), 7);

        std::env::set_var("THREADBOX_TEST_NUMBER", " 42 ");
        assert_eq!(parse_env_or("THREADBOX_TEST_NUMBER", 7u64).unwrap(), 42);

        std::env::set_var("THREADBOX_TEST_NUMBER", "forty-two");
        assert!(parse_env_or("THREADBOX_TEST_NUMBER", 7u64).is_err());

        std::env::remove_var("THREADBOX_TEST_NUMBER");
    }

    #[test]
    #[serial]
    fn test_parse_env_port_range() {
        std::env::remove_var("THREADBOX_TEST_RANGE");
        assert_eq!(
            parse_env_port_range_or("THREADBOX_TEST_RANGE", (1, 2)).unwrap(),
            (1, 2)
        );

        std::env::set_var("THREADBOX_TEST_RANGE", "9000-9010");
        assert_eq!(
            parse_env_port_range_or("THREADBOX_TEST_RANGE", (1, 2)).unwrap(),
            (9000, 9010)
        );

        std::env::set_var("THREADBOX_TEST_RANGE", "9010-9000");
        assert!(parse_env_port_range_or("THREADBOX_TEST_RANGE", (1, 2)).is_err());

        std::env::set_var("THREADBOX_TEST_RANGE", "9010");
        assert!(parse_env_port_range_or("THREADBOX_TEST_RANGE", (1, 2)).is_err());

        std::env::remove_var("THREADBOX_TEST_RANGE");
    }
}
