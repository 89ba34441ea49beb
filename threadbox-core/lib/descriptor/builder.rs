use std::net::SocketAddr;

use serde_json::Value;
use threadbox_utils::{DEFAULT_COMPATIBILITY_DATE, LOCALHOST_IP, PROGRAM_FILENAME};
use typed_builder::TypedBuilder;

use crate::{
    permission::PermissionSet,
    provider::ThreadProvider,
    ThreadboxResult,
};

use super::{
    CapabilityBinding, ExtensionModule, IsolationFlags, ProgramModule, SocketBinding,
    StorageBinding, ThreadDescriptor, WalletBinding, HTTP_SOCKET_NAME, STORAGE_EXTENSION_MODULE,
    STORAGE_RPC_PATH, WALLET_EXTENSION_MODULE, WALLET_RPC_PATH,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Compiles a provider and the orb it runs for into a [`ThreadDescriptor`].
///
/// Generation is pure. Writing the descriptor to disk is the registry's job.
///
/// ## Examples
///
/// ```
/// use threadbox_core::{descriptor::DescriptorBuilder, provider::{ThreadProvider, ThreadType}};
///
/// let provider = ThreadProvider::builder()
///     .id("uniswap")
///     .source("export default {}")
///     .thread_type(ThreadType::Dex)
///     .permissions(vec!["storage::isolated".to_string()])
///     .build();
///
/// let descriptor = DescriptorBuilder::builder()
///     .port(9100)
///     .provider(&provider)
///     .orb_id(1)
///     .sector_id(2)
///     .chain("ethereum")
///     .rpc_base_url("http://127.0.0.1:5590/rpc")
///     .build()
///     .generate()
///     .unwrap();
///
/// assert!(descriptor.storage_binding().is_some());
/// assert!(descriptor.wallet_binding().is_none());
/// ```
#[derive(Debug, TypedBuilder)]
pub struct DescriptorBuilder<'a> {
    /// Loopback port the thread listens on.
    port: u16,

    /// The provider being compiled.
    provider: &'a ThreadProvider,

    /// Runtime compatibility marker.
    #[builder(default = DEFAULT_COMPATIBILITY_DATE)]
    compatibility_date: &'a str,

    /// Orb the thread is spawned for.
    orb_id: i64,

    /// Sector of that orb.
    sector_id: i64,

    /// Chain of that orb.
    chain: &'a str,

    /// Base URL of the host RPC routes, without a trailing route segment.
    rpc_base_url: &'a str,

    /// Thread config passed to the program.
    #[builder(default, setter(strip_option))]
    config: Option<&'a Value>,

    /// Wallet grant id the host issued for this thread, if it has wallet access.
    #[builder(default, setter(strip_option))]
    wallet_grant: Option<&'a str>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DescriptorBuilder<'_> {
    /// Generates the descriptor.
    ///
    /// Fails, without producing any binding, if a single permission of the provider is
    /// invalid or the permissions conflict.
    pub fn generate(&self) -> ThreadboxResult<ThreadDescriptor> {
        let permissions =
            PermissionSet::from_permissions(self.provider.get_id(), self.provider.get_permissions())?;
        let bindings = self.bindings(&permissions);

        // Outbound reach is limited to the routes of the granted bindings.
        let outbound = bindings
            .iter()
            .map(|binding| match binding {
                CapabilityBinding::Storage(storage) => storage.get_rpc_url().clone(),
                CapabilityBinding::Wallet(wallet) => wallet.get_rpc_url().clone(),
            })
            .collect();

        Ok(ThreadDescriptor {
            compatibility_date: self.compatibility_date.to_string(),
            program: ProgramModule {
                name: PROGRAM_FILENAME.to_string(),
                kind: *self.provider.get_execution_kind(),
                source: self.provider.get_source().clone(),
            },
            socket: SocketBinding {
                name: HTTP_SOCKET_NAME.to_string(),
                address: SocketAddr::new(LOCALHOST_IP, self.port),
            },
            extensions: vec![
                ExtensionModule {
                    name: STORAGE_EXTENSION_MODULE.to_string(),
                    internal: true,
                },
                ExtensionModule {
                    name: WALLET_EXTENSION_MODULE.to_string(),
                    internal: true,
                },
            ],
            bindings,
            isolation: IsolationFlags {
                inherit_env: false,
                filesystem: false,
                outbound,
            },
            config: self.config.cloned().unwrap_or(Value::Null),
        })
    }

    /// Generates the descriptor and serializes it to YAML.
    pub fn render(&self) -> ThreadboxResult<String> {
        self.generate()?.to_yaml()
    }

    fn bindings(&self, permissions: &PermissionSet) -> Vec<CapabilityBinding> {
        let mut bindings = Vec::with_capacity(2);

        if let Some(scope) = permissions.storage() {
            bindings.push(CapabilityBinding::Storage(StorageBinding::new(
                scope,
                self.provider.get_id().clone(),
                self.orb_id,
                self.sector_id,
                self.chain,
                self.rpc_url(STORAGE_RPC_PATH),
            )));
        }

        if let Some(access) = permissions.wallet() {
            bindings.push(CapabilityBinding::Wallet(WalletBinding::new(
                access,
                self.orb_id,
                self.sector_id,
                self.chain.to_string(),
                self.rpc_url(WALLET_RPC_PATH),
                self.wallet_grant.map(str::to_string),
            )));
        }

        bindings
    }

    fn rpc_base(&self) -> &str {
        self.rpc_base_url.trim_end_matches('/')
    }

    fn rpc_url(&self, path: &str) -> String {
        format!("{}/{}", self.rpc_base(), path)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        permission::{StorageScope, WalletAccess},
        provider::ThreadType,
        ThreadboxError,
    };

    fn provider(permissions: &[&str]) -> ThreadProvider {
        ThreadProvider::builder()
            .id("uniswap")
            .source("export default { fetch() {} }")
            .thread_type(ThreadType::Dex)
            .permissions(permissions.iter().map(|p| p.to_string()).collect())
            .build()
    }

    fn generate(provider: &ThreadProvider) -> ThreadboxResult<ThreadDescriptor> {
        DescriptorBuilder::builder()
            .port(9123)
            .provider(provider)
            .orb_id(7)
            .sector_id(3)
            .chain("ethereum")
            .rpc_base_url("http://127.0.0.1:5590/rpc/")
            .build()
            .generate()
    }

    #[test]
    fn test_isolated_only_provider_gets_one_isolated_binding() -> anyhow::Result<()> {
        let descriptor = generate(&provider(&["storage::isolated"]))?;

        assert_eq!(descriptor.bindings.len(), 1);
        let storage = descriptor.storage_binding().expect("storage binding");
        assert_eq!(*storage.get_scope(), StorageScope::Isolated);
        assert_eq!(storage.get_provider_id(), "uniswap");
        assert_eq!(*storage.get_orb_id(), 7);
        assert_eq!(*storage.get_sector_id(), 3);
        assert_eq!(*storage.get_chain(), None);
        assert_eq!(storage.get_rpc_url(), "http://127.0.0.1:5590/rpc/storage");
        assert!(descriptor.wallet_binding().is_none());
        assert_eq!(
            descriptor.isolation.outbound,
            vec!["http://127.0.0.1:5590/rpc/storage".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_network_storage_binding_carries_chain() -> anyhow::Result<()> {
        let descriptor = generate(&provider(&["storage::network::pool", "wallet::read"]))?;

        let storage = descriptor.storage_binding().expect("storage binding");
        assert_eq!(*storage.get_scope(), StorageScope::Network);
        assert_eq!(storage.get_chain().as_deref(), Some("ethereum"));

        let wallet = descriptor.wallet_binding().expect("wallet binding");
        assert_eq!(*wallet.get_access(), WalletAccess::Read);
        assert_eq!(wallet.get_chain(), "ethereum");
        assert_eq!(wallet.get_rpc_url(), "http://127.0.0.1:5590/rpc/wallet");
        assert_eq!(*wallet.get_grant(), None);
        assert_eq!(descriptor.isolation.outbound.len(), 2);
        Ok(())
    }

    #[test]
    fn test_duplicate_wallet_permissions_add_one_binding() -> anyhow::Result<()> {
        let descriptor = generate(&provider(&["wallet::read", "wallet::sign", "wallet::read"]))?;

        assert_eq!(descriptor.bindings.len(), 1);
        assert_eq!(
            *descriptor.wallet_binding().expect("wallet binding").get_access(),
            WalletAccess::Sign
        );
        Ok(())
    }

    #[test]
    fn test_no_permissions_means_no_bindings() -> anyhow::Result<()> {
        let descriptor = generate(&provider(&[]))?;

        assert!(descriptor.bindings.is_empty());
        assert_eq!(descriptor.extensions.len(), 2);
        assert_eq!(descriptor.socket.address.to_string(), "127.0.0.1:9123");
        assert!(!descriptor.isolation.inherit_env);
        assert!(descriptor.isolation.outbound.is_empty());
        Ok(())
    }

    #[test]
    fn test_wallet_grant_is_written_into_wallet_binding() -> anyhow::Result<()> {
        let provider = provider(&["wallet::sign"]);
        let descriptor = DescriptorBuilder::builder()
            .port(9124)
            .provider(&provider)
            .orb_id(7)
            .sector_id(3)
            .chain("ethereum")
            .rpc_base_url("http://127.0.0.1:5590/rpc")
            .wallet_grant("0f3c")
            .build()
            .generate()?;

        let wallet = descriptor.wallet_binding().expect("wallet binding");
        assert_eq!(wallet.get_grant().as_deref(), Some("0f3c"));
        assert_eq!(
            descriptor.isolation.outbound,
            vec!["http://127.0.0.1:5590/rpc/wallet".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_invalid_permission_fails_closed() {
        let result = generate(&provider(&["storage::isolated", "wallet::admin"]));
        assert!(matches!(result, Err(ThreadboxError::InvalidPermission(_))));
    }

    #[test]
    fn test_render_round_trips_through_yaml() -> anyhow::Result<()> {
        let provider = provider(&["storage::isolated", "wallet::sign"]);
        let config = json!({ "slippage": 0.5 });
        let builder = DescriptorBuilder::builder()
            .port(9200)
            .provider(&provider)
            .orb_id(1)
            .sector_id(1)
            .chain("solana")
            .rpc_base_url("http://127.0.0.1:5590/rpc")
            .config(&config)
            .build();

        let yaml = builder.render()?;
        assert!(yaml.contains("name: storage"));
        assert!(yaml.contains("name: wallet"));
        assert!(yaml.contains("scope: isolated"));

        let parsed = ThreadDescriptor::from_yaml(&yaml)?;
        assert_eq!(parsed, builder.generate()?);
        assert_eq!(parsed.config, config);
        Ok(())
    }
}
