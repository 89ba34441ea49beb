use std::{
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use threadbox_utils::env::{DESCRIPTOR_ENV_VAR, THREAD_PORT_ENV_VAR};
use tokio::process::{Child, Command};

use crate::{config::RegistryConfig, hash::ConfigHash, SpawnError};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Host environment variables passed through to the runtime. Everything else is dropped.
const PASSTHROUGH_ENV_VARS: &[&str] = &["PATH", "RUST_LOG"];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Everything a launcher needs to start one thread runtime.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    /// Hash of the thread being launched.
    pub hash: ConfigHash,

    /// Loopback port the runtime must listen on.
    pub port: u16,

    /// Path of the generated descriptor.
    pub descriptor_path: PathBuf,

    /// Private working directory of the thread.
    pub work_dir: PathBuf,
}

/// Launches thread runtimes as child processes of the host.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    exe: PathBuf,
    args: Vec<String>,
}

/// A runtime started by [`CommandLauncher`].
pub struct ChildHandle {
    child: Child,
    pid: Option<u32>,
    exited: bool,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A running thread runtime.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// OS process id, when there is one.
    fn id(&self) -> Option<u32>;

    /// Whether the runtime is still running. Never blocks.
    fn is_alive(&mut self) -> bool;

    /// Stops the runtime, escalating to a hard kill after `grace`. Stopping a runtime that
    /// already exited succeeds.
    async fn terminate(&mut self, grace: Duration);
}

/// Starts thread runtimes.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Starts the runtime described by `context`.
    ///
    /// Returning does not mean the runtime is ready; the registry waits for its socket.
    async fn launch(&self, context: &LaunchContext) -> Result<Box<dyn ProcessHandle>, SpawnError>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CommandLauncher {
    /// Creates a launcher running `exe` with `args`, followed by the descriptor path.
    pub fn new(exe: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            exe: exe.into(),
            args,
        }
    }

    /// Creates a launcher for the runtime configured in `config`.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.get_runtime_exe(), config.get_runtime_args().clone())
    }

    /// The runtime executable.
    pub fn exe(&self) -> &Path {
        &self.exe
    }

    fn command(&self, context: &LaunchContext) -> Command {
        let mut command = Command::new(&self.exe);
        command
            .args(&self.args)
            .arg(&context.descriptor_path)
            .current_dir(&context.work_dir)
            .env_clear()
            .env(DESCRIPTOR_ENV_VAR, &context.descriptor_path)
            .env(THREAD_PORT_ENV_VAR, context.port.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        for name in PASSTHROUGH_ENV_VARS {
            if let Ok(value) = std::env::var(name) {
                command.env(name, value);
            }
        }

        command
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Launcher for CommandLauncher {
    async fn launch(&self, context: &LaunchContext) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        let child = self.command(context).spawn().map_err(|e| {
            SpawnError::Launch(format!("failed to start {}: {}", self.exe.display(), e))
        })?;

        let pid = child.id();
        tracing::info!(
            "started thread runtime {} (pid {:?}) on port {}",
            context.hash.short(),
            pid,
            context.port
        );

        Ok(Box::new(ChildHandle {
            child,
            pid,
            exited: false,
        }))
    }
}

#[async_trait]
impl ProcessHandle for ChildHandle {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        if self.exited {
            return false;
        }

        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::debug!("thread runtime {:?} exited with {}", self.pid, status);
                self.exited = true;
                false
            }
            Err(e) => {
                tracing::warn!("failed to poll thread runtime {:?}: {}", self.pid, e);
                false
            }
        }
    }

    async fn terminate(&mut self, grace: Duration) {
        // The pid of a reaped child may already belong to someone else.
        if !self.is_alive() {
            return;
        }

        if let Some(pid) = self.pid {
            match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => tracing::warn!("failed to send SIGTERM to thread runtime {}: {}", pid, e),
            }
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                tracing::warn!(
                    "thread runtime {:?} ignored SIGTERM for {:?}, killing",
                    self.pid,
                    grace
                );
                if let Err(e) = self.child.kill().await {
                    tracing::error!("failed to kill thread runtime {:?}: {}", self.pid, e);
                }
            }
        }

        self.exited = true;
    }
}

impl fmt::Debug for ChildHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildHandle")
            .field("pid", &self.pid)
            .field("exited", &self.exited)
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serde_json::json;

    use super::*;
    use crate::hash::config_hash;

    fn context(dir: &Path) -> LaunchContext {
        LaunchContext {
            hash: config_hash("test", &json!({})),
            port: 9100,
            descriptor_path: dir.join("thread.yaml"),
            work_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_launch_missing_executable_fails() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = CommandLauncher::new("/nonexistent/threadbox-runtime", vec![]);

        let result = launcher.launch(&context(dir.path())).await;
        assert!(matches!(result, Err(SpawnError::Launch(_))));
    }

    #[tokio::test]
    async fn test_terminate_sends_sigterm() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = CommandLauncher::new("sleep", vec!["30".to_string()]);

        // The descriptor path is the last argument; make it a valid duration for `sleep`.
        let mut ctx = context(dir.path());
        ctx.descriptor_path = PathBuf::from("30");

        let mut handle = launcher.launch(&ctx).await.unwrap();
        assert!(handle.id().is_some());
        assert!(handle.is_alive());

        let started = Instant::now();
        handle.terminate(Duration::from_secs(5)).await;
        assert!(!handle.is_alive());
        assert!(started.elapsed() < Duration::from_secs(5));

        // Terminating twice is harmless.
        handle.terminate(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_environment_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("THREADBOX_TEST_SECRET", "hunter2");

        let out = dir.path().join("env.txt");
        let script = format!("env > {}", out.display());
        let launcher = CommandLauncher::new("sh", vec!["-c".to_string(), script]);

        let mut handle = launcher.launch(&context(dir.path())).await.unwrap();
        for _ in 0..100 {
            if !handle.is_alive() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let env = std::fs::read_to_string(&out).unwrap();
        assert!(!env.contains("THREADBOX_TEST_SECRET"));
        assert!(env.contains("THREADBOX_DESCRIPTOR="));
        assert!(env.contains("THREADBOX_PORT=9100"));

        std::env::remove_var("THREADBOX_TEST_SECRET");
    }
}
