use std::net::SocketAddr;

use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    permission::{StorageScope, WalletAccess},
    provider::ExecutionKind,
    ThreadboxResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Name of the storage extension module.
pub const STORAGE_EXTENSION_MODULE: &str = "threadbox:storage";

/// Name of the wallet extension module.
pub const WALLET_EXTENSION_MODULE: &str = "threadbox:wallet";

/// Name of the thread's listening socket.
pub const HTTP_SOCKET_NAME: &str = "http";

/// Path of the storage RPC route, relative to the RPC base URL.
pub const STORAGE_RPC_PATH: &str = "storage";

/// Path of the wallet RPC route, relative to the RPC base URL.
pub const WALLET_RPC_PATH: &str = "wallet";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The generated runtime descriptor of one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadDescriptor {
    /// Runtime compatibility marker.
    pub compatibility_date: String,

    /// The provider program.
    pub program: ProgramModule,

    /// The socket the thread listens on.
    pub socket: SocketBinding,

    /// Extension modules made available to the program.
    pub extensions: Vec<ExtensionModule>,

    /// Capability bindings injected into the program.
    pub bindings: Vec<CapabilityBinding>,

    /// Isolation settings for the runtime.
    pub isolation: IsolationFlags,

    /// The thread config, passed through untouched.
    #[serde(default)]
    pub config: Value,
}

/// The program module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramModule {
    /// Module name.
    pub name: String,

    /// How the module is loaded.
    pub kind: ExecutionKind,

    /// Program text.
    pub source: String,
}

/// A listening socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketBinding {
    /// Socket name.
    pub name: String,

    /// Address to listen on; always loopback.
    pub address: SocketAddr,
}

/// An extension module loaded into the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionModule {
    /// Module name.
    pub name: String,

    /// Internal modules can only be imported by bindings, never by the program itself.
    pub internal: bool,
}

/// Runtime isolation flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationFlags {
    /// Whether the runtime passes the host environment through.
    pub inherit_env: bool,

    /// Whether the program may touch the filesystem.
    pub filesystem: bool,

    /// Origins the program may open outbound connections to.
    pub outbound: Vec<String>,
}

/// A capability binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum CapabilityBinding {
    /// Storage access.
    Storage(StorageBinding),

    /// Wallet access.
    Wallet(WalletBinding),
}

/// Parameters of a storage binding.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[getset(get = "pub with_prefix")]
pub struct StorageBinding {
    /// Extension module implementing the binding.
    module: String,

    /// Storage scope.
    scope: StorageScope,

    /// Provider the state belongs to.
    provider_id: String,

    /// Orb the thread was spawned for.
    orb_id: i64,

    /// Sector of that orb.
    sector_id: i64,

    /// Chain, network scope only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chain: Option<String>,

    /// Storage RPC endpoint.
    rpc_url: String,
}

/// Parameters of a wallet binding.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[getset(get = "pub with_prefix")]
pub struct WalletBinding {
    /// Extension module implementing the binding.
    module: String,

    /// Access level.
    access: WalletAccess,

    /// Orb the thread was spawned for.
    orb_id: i64,

    /// Sector of that orb.
    sector_id: i64,

    /// Chain of that orb.
    chain: String,

    /// Wallet RPC endpoint.
    rpc_url: String,

    /// Host-issued grant id presented with every wallet call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    grant: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ThreadDescriptor {
    /// Serializes the descriptor to YAML.
    pub fn to_yaml(&self) -> ThreadboxResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parses a descriptor from YAML.
    pub fn from_yaml(content: &str) -> ThreadboxResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// The storage binding, if one was granted.
    pub fn storage_binding(&self) -> Option<&StorageBinding> {
        self.bindings.iter().find_map(|binding| match binding {
            CapabilityBinding::Storage(storage) => Some(storage),
            _ => None,
        })
    }

    /// The wallet binding, if one was granted.
    pub fn wallet_binding(&self) -> Option<&WalletBinding> {
        self.bindings.iter().find_map(|binding| match binding {
            CapabilityBinding::Wallet(wallet) => Some(wallet),
            _ => None,
        })
    }
}

impl StorageBinding {
    pub(crate) fn new(
        scope: StorageScope,
        provider_id: String,
        orb_id: i64,
        sector_id: i64,
        chain: &str,
        rpc_url: String,
    ) -> Self {
        let chain = match scope {
            StorageScope::Network => Some(chain.to_string()),
            StorageScope::Isolated => None,
        };

        Self {
            module: STORAGE_EXTENSION_MODULE.to_string(),
            scope,
            provider_id,
            orb_id,
            sector_id,
            chain,
            rpc_url,
        }
    }
}

impl WalletBinding {
    pub(crate) fn new(
        access: WalletAccess,
        orb_id: i64,
        sector_id: i64,
        chain: String,
        rpc_url: String,
        grant: Option<String>,
    ) -> Self {
        Self {
            module: WALLET_EXTENSION_MODULE.to_string(),
            access,
            orb_id,
            sector_id,
            chain,
            rpc_url,
            grant,
        }
    }
}
