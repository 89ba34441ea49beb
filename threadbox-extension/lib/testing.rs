//! A real loopback host for extension tests.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use threadbox_core::{
    config::{default_rpc_base_url, RegistryConfig},
    descriptor::{DescriptorBuilder, ThreadDescriptor},
    permission::PermissionSet,
    process::{CommandLauncher, ProcessRegistry},
    provider::{ProviderCatalog, ThreadProvider, ThreadType},
    service::ThreadService,
    target::{
        get_memory_pool, SqliteOrbDirectory, StorageTarget, TradingMode, WalletContext,
        WalletGrant, WalletGrants, WalletService, WalletServices, WalletTarget,
        STORE_DB_MIGRATOR,
    },
    ThreadboxError, ThreadboxResult,
};
use threadbox_server::{create_router, AppState, Config};
use threadbox_utils::LOCALHOST_IP;
use tokio::{net::TcpListener, task::JoinHandle};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const SECTOR_ID: i64 = 10;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A threadbox server bound to an ephemeral loopback port.
///
/// Orbs 1 and 2 trade on ethereum and orb 3 on polygon, all in sector 10. Only ethereum has a
/// wallet service.
pub(crate) struct TestHost {
    port: u16,
    grants: WalletGrants,
    task: JoinHandle<()>,
}

struct TestWallet;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TestHost {
    pub(crate) async fn start() -> anyhow::Result<Self> {
        let pool = get_memory_pool(&STORE_DB_MIGRATOR).await?;

        let directory = Arc::new(SqliteOrbDirectory::new(pool.clone()));
        directory.upsert_sector(SECTOR_ID, TradingMode::Paper).await?;
        directory.upsert_orb(1, SECTOR_ID, "ethereum").await?;
        directory.upsert_orb(2, SECTOR_ID, "ethereum").await?;
        directory.upsert_orb(3, SECTOR_ID, "polygon").await?;

        let mut services = WalletServices::new();
        services.register("ethereum", Arc::new(TestWallet));

        let registry = ProcessRegistry::new(
            RegistryConfig::default(),
            Arc::new(ProviderCatalog::new()),
            Arc::new(CommandLauncher::new("true", Vec::new())),
        )?;

        let grants = registry.grants().clone();
        let listener = TcpListener::bind((LOCALHOST_IP, 0)).await?;
        let port = listener.local_addr()?.port();

        let config = Config::new(Some(port), Some(PathBuf::from("/tmp/threadbox-test")), None);
        let router = create_router(AppState::new(
            Arc::new(config),
            Arc::new(ThreadService::new(registry)),
            StorageTarget::new(pool, directory.clone()),
            WalletTarget::new(directory, services),
        ));

        let task = tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        Ok(Self { port, grants, task })
    }

    pub(crate) fn rpc_base_url(&self) -> String {
        default_rpc_base_url(self.port)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for TestHost {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl WalletService for TestWallet {
    async fn get_address(&self, context: &WalletContext) -> ThreadboxResult<String> {
        Ok(format!("0x{:040}", context.orb_id))
    }

    async fn send_transaction(
        &self,
        _context: &WalletContext,
        _transaction: &serde_json::Value,
    ) -> ThreadboxResult<serde_json::Value> {
        Err(ThreadboxError::Wallet("insufficient funds".to_string()))
    }

    async fn sign_message(&self, context: &WalletContext, message: &str) -> ThreadboxResult<String> {
        Ok(format!("signed:{}:{}", context.orb_id, message))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Generates the descriptor a thread of `provider_id` would receive for `orb_id`, issuing a
/// wallet grant on the host when the provider has wallet access.
pub(crate) async fn descriptor(
    host: &TestHost,
    provider_id: &str,
    permissions: &[&str],
    orb_id: i64,
    chain: &str,
) -> anyhow::Result<ThreadDescriptor> {
    let provider = ThreadProvider::builder()
        .id(provider_id)
        .source("export default {}")
        .thread_type(ThreadType::Dex)
        .permissions(permissions.iter().map(|p| p.to_string()).collect())
        .build();

    let permissions = PermissionSet::from_permissions(provider_id, provider.get_permissions())?;
    let grant = match permissions.wallet() {
        Some(access) => Some(
            host.grants
                .issue(WalletGrant {
                    access,
                    orb_id,
                    sector_id: SECTOR_ID,
                    chain: chain.to_string(),
                })
                .await,
        ),
        None => None,
    };

    let rpc_base_url = host.rpc_base_url();
    let builder = DescriptorBuilder::builder()
        .port(9100)
        .provider(&provider)
        .orb_id(orb_id)
        .sector_id(SECTOR_ID)
        .chain(chain)
        .rpc_base_url(&rpc_base_url);

    let descriptor = match &grant {
        Some(grant) => builder.wallet_grant(grant).build().generate()?,
        None => builder.build().generate()?,
    };

    Ok(descriptor)
}
