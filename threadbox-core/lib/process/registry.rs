use std::{
    collections::HashMap,
    fmt,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use serde::Serialize;
use tempfile::TempDir;
use threadbox_utils::{DESCRIPTOR_FILENAME, LOCALHOST_IP, PROGRAM_FILENAME, THREAD_TEMP_DIR_PREFIX};
use tokio::{net::TcpStream, sync::Mutex};

use crate::{
    config::RegistryConfig,
    descriptor::DescriptorBuilder,
    hash::{config_hash, ConfigHash},
    permission::PermissionSet,
    provider::{ProviderRegistry, ThreadProvider},
    service::ThreadRequest,
    target::{WalletGrant, WalletGrants},
    SpawnError, ThreadboxError, ThreadboxResult,
};

use super::{LaunchContext, Launcher, PortAllocator, ProcessHandle};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Delay between two readiness probes of a starting runtime.
const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(50);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

type SpawnFuture = Shared<BoxFuture<'static, Result<u16, SpawnError>>>;

/// Spawns, reuses and evicts thread runtimes, keyed by [`ConfigHash`].
///
/// Each hash moves through `absent -> spawning -> ready -> absent`. Lookups of a ready,
/// live thread return its port. The first lookup of an absent hash starts exactly one spawn
/// and every concurrent lookup of the same hash awaits that spawn. The spawn runs on its own
/// task, so a caller that stops waiting does not abort it.
///
/// Cloning is cheap and every clone shares the same map.
#[derive(Clone)]
pub struct ProcessRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: RegistryConfig,
    providers: Arc<dyn ProviderRegistry>,
    launcher: Arc<dyn Launcher>,
    slots: Mutex<HashMap<ConfigHash, Slot>>,
    ports: Mutex<PortAllocator>,
    grants: WalletGrants,
    shut_down: AtomicBool,
}

enum Slot {
    Spawning(SpawnFuture),
    Ready(ManagedProcess),
}

enum Lookup {
    Hit(u16),
    Dead,
    Pending(SpawnFuture),
    Miss,
}

/// A ready thread runtime owned by the registry.
pub struct ManagedProcess {
    handle: Box<dyn ProcessHandle>,
    port: u16,
    hash: ConfigHash,
    provider_id: String,
    started_at: DateTime<Utc>,
    last_used: Instant,
    temp_dir: Option<TempDir>,
    wallet_grant: Option<String>,
}

/// Why a thread was retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retirement {
    Expired,
    Dead,
}

/// Outcome of one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    /// Threads retired because they sat idle past the TTL.
    pub expired: usize,

    /// Threads removed because their process had exited.
    pub dead: usize,

    /// Threads still registered after the sweep, spawning ones included.
    pub remaining: usize,
}

/// Snapshot of one ready thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadStatus {
    /// Cache key of the thread.
    pub hash: ConfigHash,

    /// Provider the thread runs.
    pub provider_id: String,

    /// Loopback port the thread listens on.
    pub port: u16,

    /// OS process id, if any.
    pub pid: Option<u32>,

    /// When the thread became ready.
    pub started_at: DateTime<Utc>,

    /// Seconds since the thread was last served.
    pub idle_secs: u64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProcessRegistry {
    /// Creates an empty registry.
    pub fn new(
        config: RegistryConfig,
        providers: Arc<dyn ProviderRegistry>,
        launcher: Arc<dyn Launcher>,
    ) -> ThreadboxResult<Self> {
        let (start, end) = *config.get_port_range();
        let ports = PortAllocator::new(start, end)?;

        Ok(Self {
            inner: Arc::new(RegistryInner {
                config,
                providers,
                launcher,
                slots: Mutex::new(HashMap::new()),
                ports: Mutex::new(ports),
                grants: WalletGrants::new(),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// The registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Wallet grants of the running threads, checked by the wallet RPC route.
    pub fn grants(&self) -> &WalletGrants {
        &self.inner.grants
    }

    /// Returns the port of the thread serving `request`, spawning it if needed.
    pub async fn get_or_spawn(&self, request: &ThreadRequest) -> ThreadboxResult<u16> {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(SpawnError::ShutDown.into());
        }

        let provider = self
            .inner
            .providers
            .get_provider(&request.provider_id)
            .ok_or_else(|| ThreadboxError::ProviderNotFound(request.provider_id.clone()))?;

        let hash = config_hash(&request.provider_id, &request.config);

        let spawn = {
            let mut slots = self.inner.slots.lock().await;

            let lookup = match slots.get_mut(&hash) {
                Some(Slot::Ready(process)) => {
                    if process.handle.is_alive() {
                        process.last_used = Instant::now();
                        Lookup::Hit(process.port)
                    } else {
                        Lookup::Dead
                    }
                }
                Some(Slot::Spawning(spawn)) => Lookup::Pending(spawn.clone()),
                None => Lookup::Miss,
            };

            match lookup {
                Lookup::Hit(port) => {
                    tracing::debug!(
                        "reusing thread {} on port {} for orb {}",
                        hash.short(),
                        port,
                        request.orb_id
                    );
                    return Ok(port);
                }
                Lookup::Pending(spawn) => {
                    tracing::debug!("awaiting in-flight spawn of thread {}", hash.short());
                    spawn
                }
                Lookup::Dead | Lookup::Miss => {
                    if let Some(Slot::Ready(dead)) = slots.remove(&hash) {
                        tracing::warn!(
                            "thread {} on port {} died, respawning",
                            hash.short(),
                            dead.port
                        );
                        self.inner.retire(dead, Retirement::Dead).await;
                    }

                    let spawn = self.start_spawn(hash.clone(), provider, request.clone());
                    slots.insert(hash.clone(), Slot::Spawning(spawn.clone()));
                    spawn
                }
            }
        };

        Ok(spawn.await?)
    }

    /// Retires every ready thread idle for longer than `ttl` and every thread whose process
    /// has exited. Spawning threads are never touched.
    pub async fn cleanup_expired(&self, ttl: Duration) -> CleanupStats {
        let (retired, remaining) = {
            let mut slots = self.inner.slots.lock().await;

            let candidates: Vec<(ConfigHash, Retirement)> = slots
                .iter_mut()
                .filter_map(|(hash, slot)| {
                    let Slot::Ready(process) = slot else {
                        return None;
                    };

                    if !process.handle.is_alive() {
                        Some((hash.clone(), Retirement::Dead))
                    } else if process.last_used.elapsed() > ttl {
                        Some((hash.clone(), Retirement::Expired))
                    } else {
                        None
                    }
                })
                .collect();

            let retired: Vec<(ManagedProcess, Retirement)> = candidates
                .into_iter()
                .filter_map(|(hash, reason)| match slots.remove(&hash) {
                    Some(Slot::Ready(process)) => Some((process, reason)),
                    Some(other) => {
                        slots.insert(hash, other);
                        None
                    }
                    None => None,
                })
                .collect();

            (retired, slots.len())
        };

        let mut stats = CleanupStats {
            remaining,
            ..Default::default()
        };

        for (process, reason) in retired {
            match reason {
                Retirement::Expired => stats.expired += 1,
                Retirement::Dead => stats.dead += 1,
            }
            self.inner.retire(process, reason).await;
        }

        stats
    }

    /// Snapshots every ready thread, ordered by port.
    pub async fn list(&self) -> Vec<ThreadStatus> {
        let slots = self.inner.slots.lock().await;

        let mut threads: Vec<ThreadStatus> = slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(process) => Some(process.status()),
                Slot::Spawning(_) => None,
            })
            .collect();

        threads.sort_by_key(|thread| thread.port);
        threads
    }

    /// Number of registered threads, spawning ones included.
    pub async fn len(&self) -> usize {
        self.inner.slots.lock().await.len()
    }

    /// Whether no thread is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether `hash` is currently being spawned.
    pub async fn is_spawning(&self, hash: &ConfigHash) -> bool {
        matches!(
            self.inner.slots.lock().await.get(hash),
            Some(Slot::Spawning(_))
        )
    }

    /// Stops every thread and refuses further spawns. Returns how many threads were stopped.
    ///
    /// Spawns still in flight stop their runtime as soon as it is up.
    pub async fn shutdown(&self) -> usize {
        self.inner.shut_down.store(true, Ordering::SeqCst);

        let ready: Vec<ManagedProcess> = {
            let mut slots = self.inner.slots.lock().await;
            slots
                .drain()
                .filter_map(|(_, slot)| match slot {
                    Slot::Ready(process) => Some(process),
                    Slot::Spawning(_) => None,
                })
                .collect()
        };

        let count = ready.len();
        for process in ready {
            self.inner.retire(process, Retirement::Expired).await;
        }

        tracing::info!("process registry shut down, stopped {} threads", count);
        count
    }

    fn start_spawn(
        &self,
        hash: ConfigHash,
        provider: Arc<ThreadProvider>,
        request: ThreadRequest,
    ) -> SpawnFuture {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.spawn_thread(hash, provider, request).await });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(SpawnError::Launch(format!("spawn task failed: {}", e))),
            }
        }
        .boxed()
        .shared()
    }
}

impl RegistryInner {
    /// Runs one spawn to completion and records the outcome in the map.
    async fn spawn_thread(
        &self,
        hash: ConfigHash,
        provider: Arc<ThreadProvider>,
        request: ThreadRequest,
    ) -> Result<u16, SpawnError> {
        let result = self.spawn_process(&hash, &provider, &request).await;

        let mut slots = self.slots.lock().await;
        match result {
            Ok(process) if self.shut_down.load(Ordering::SeqCst) => {
                slots.remove(&hash);
                drop(slots);
                self.retire(process, Retirement::Expired).await;
                Err(SpawnError::ShutDown)
            }
            Ok(process) => {
                let port = process.port;
                tracing::info!(
                    "thread {} for provider {} ready on port {}",
                    hash.short(),
                    provider.get_id(),
                    port
                );
                slots.insert(hash, Slot::Ready(process));
                Ok(port)
            }
            Err(e) => {
                tracing::error!("failed to spawn thread {}: {}", hash.short(), e);
                slots.remove(&hash);
                Err(e)
            }
        }
    }

    async fn spawn_process(
        &self,
        hash: &ConfigHash,
        provider: &ThreadProvider,
        request: &ThreadRequest,
    ) -> Result<ManagedProcess, SpawnError> {
        let permissions =
            PermissionSet::from_permissions(provider.get_id(), provider.get_permissions())
                .map_err(|e| SpawnError::Descriptor(e.to_string()))?;

        let port = self.ports.lock().await.allocate()?;

        let wallet_grant = match permissions.wallet() {
            Some(access) => Some(
                self.grants
                    .issue(WalletGrant {
                        access,
                        orb_id: request.orb_id,
                        sector_id: request.sector_id,
                        chain: request.chain.clone(),
                    })
                    .await,
            ),
            None => None,
        };

        match self
            .start_on_port(hash, provider, request, port, wallet_grant.as_deref())
            .await
        {
            Ok(mut process) => {
                process.wallet_grant = wallet_grant;
                Ok(process)
            }
            Err(e) => {
                if let Some(grant) = &wallet_grant {
                    self.grants.revoke(grant).await;
                }
                self.ports.lock().await.release(port);
                Err(e)
            }
        }
    }

    async fn start_on_port(
        &self,
        hash: &ConfigHash,
        provider: &ThreadProvider,
        request: &ThreadRequest,
        port: u16,
        wallet_grant: Option<&str>,
    ) -> Result<ManagedProcess, SpawnError> {
        let builder = DescriptorBuilder::builder()
            .port(port)
            .provider(provider)
            .compatibility_date(self.config.get_compatibility_date().as_str())
            .orb_id(request.orb_id)
            .sector_id(request.sector_id)
            .chain(request.chain.as_str())
            .rpc_base_url(self.config.get_rpc_base_url().as_str())
            .config(&request.config);

        let descriptor = match wallet_grant {
            Some(grant) => builder.wallet_grant(grant).build().render(),
            None => builder.build().render(),
        }
        .map_err(|e| SpawnError::Descriptor(e.to_string()))?;

        let temp_dir = tempfile::Builder::new()
            .prefix(THREAD_TEMP_DIR_PREFIX)
            .tempdir()
            .map_err(|e| SpawnError::Prepare(e.to_string()))?;

        let descriptor_path = temp_dir.path().join(DESCRIPTOR_FILENAME);
        write_file(&descriptor_path, descriptor.as_bytes()).await?;
        write_file(
            &temp_dir.path().join(PROGRAM_FILENAME),
            provider.get_source().as_bytes(),
        )
        .await?;

        let context = LaunchContext {
            hash: hash.clone(),
            port,
            descriptor_path,
            work_dir: temp_dir.path().to_path_buf(),
        };

        let mut handle = self.launcher.launch(&context).await?;

        if let Err(e) =
            wait_until_ready(handle.as_mut(), port, *self.config.get_readiness_timeout()).await
        {
            handle.terminate(*self.config.get_terminate_grace()).await;
            return Err(e);
        }

        Ok(ManagedProcess {
            handle,
            port,
            hash: hash.clone(),
            provider_id: provider.get_id().clone(),
            started_at: Utc::now(),
            last_used: Instant::now(),
            temp_dir: Some(temp_dir),
            wallet_grant: None,
        })
    }

    /// Stops a thread and frees its port and files. Already-dead processes are fine.
    async fn retire(&self, mut process: ManagedProcess, reason: Retirement) {
        process
            .handle
            .terminate(*self.config.get_terminate_grace())
            .await;
        self.ports.lock().await.release(process.port);

        if let Some(grant) = process.wallet_grant.take() {
            self.grants.revoke(&grant).await;
        }

        if let Some(temp_dir) = process.temp_dir.take() {
            let path = temp_dir.path().to_path_buf();
            if let Err(e) = temp_dir.close() {
                tracing::warn!("failed to remove thread dir {}: {}", path.display(), e);
            }
        }

        match reason {
            Retirement::Expired => tracing::info!(
                "retired thread {} on port {}",
                process.hash.short(),
                process.port
            ),
            Retirement::Dead => tracing::info!(
                "removed dead thread {} on port {}",
                process.hash.short(),
                process.port
            ),
        }
    }
}

impl ManagedProcess {
    /// Port the thread listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Cache key of the thread.
    pub fn hash(&self) -> &ConfigHash {
        &self.hash
    }

    /// Directory holding the thread's descriptor and program.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(|dir| dir.path())
    }

    fn status(&self) -> ThreadStatus {
        ThreadStatus {
            hash: self.hash.clone(),
            provider_id: self.provider_id.clone(),
            port: self.port,
            pid: self.handle.id(),
            started_at: self.started_at,
            idle_secs: self.last_used.elapsed().as_secs(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("hash", &self.hash)
            .field("port", &self.port)
            .field("pid", &self.handle.id())
            .field("provider_id", &self.provider_id)
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), SpawnError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| SpawnError::Prepare(format!("{}: {}", path.display(), e)))
}

/// Polls `port` until the runtime accepts a connection, it exits, or `timeout` passes.
async fn wait_until_ready(
    handle: &mut dyn ProcessHandle,
    port: u16,
    timeout: Duration,
) -> Result<(), SpawnError> {
    let deadline = Instant::now() + timeout;

    loop {
        if TcpStream::connect((LOCALHOST_IP, port)).await.is_ok() {
            return Ok(());
        }

        if !handle.is_alive() {
            return Err(SpawnError::Exited { port });
        }

        if Instant::now() >= deadline {
            return Err(SpawnError::NotReady { port, timeout });
        }

        tokio::time::sleep(READINESS_POLL_INTERVAL).await;
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
