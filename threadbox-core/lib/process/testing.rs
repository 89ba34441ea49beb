//! An in-process stand-in for the isolation runtime.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use threadbox_utils::LOCALHOST_IP;
use tokio::{net::TcpListener, task::JoinHandle};

use crate::SpawnError;

use super::{LaunchContext, Launcher, ProcessHandle};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Launches a task that listens on the thread's port instead of a real runtime.
#[derive(Debug, Default)]
pub(crate) struct FakeLauncher {
    launches: AtomicUsize,
    startup_delay: Duration,
    exit_immediately: bool,
    contexts: Mutex<Vec<LaunchContext>>,
    running: Mutex<HashMap<u16, tokio::task::AbortHandle>>,
}

struct FakeHandle {
    task: JoinHandle<()>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FakeLauncher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runtimes wait `delay` before they start listening.
    pub(crate) fn with_startup_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            startup_delay: delay,
            ..Default::default()
        })
    }

    /// Runtimes exit without ever listening.
    pub(crate) fn crashing() -> Arc<Self> {
        Arc::new(Self {
            exit_immediately: true,
            ..Default::default()
        })
    }

    pub(crate) fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub(crate) fn contexts(&self) -> Vec<LaunchContext> {
        self.contexts.lock().unwrap().clone()
    }

    /// Kills the runtime listening on `port` behind the registry's back.
    pub(crate) async fn crash(&self, port: u16) {
        let handle = self.running.lock().unwrap().remove(&port);
        if let Some(handle) = handle {
            handle.abort();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, context: &LaunchContext) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.clone());

        let port = context.port;
        let delay = self.startup_delay;
        let exit_immediately = self.exit_immediately;

        let task = tokio::spawn(async move {
            if exit_immediately {
                return;
            }

            tokio::time::sleep(delay).await;
            let Ok(listener) = TcpListener::bind((LOCALHOST_IP, port)).await else {
                return;
            };

            while listener.accept().await.is_ok() {}
        });

        self.running
            .lock()
            .unwrap()
            .insert(port, task.abort_handle());

        Ok(Box::new(FakeHandle { task }))
    }
}

#[async_trait]
impl ProcessHandle for FakeHandle {
    fn id(&self) -> Option<u32> {
        None
    }

    fn is_alive(&mut self) -> bool {
        !self.task.is_finished()
    }

    async fn terminate(&mut self, _grace: Duration) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}
