use serde_json::{json, Value};
use threadbox_core::{
    descriptor::StorageBinding,
    permission::StorageScope,
    rpc::{
        STORAGE_DELETE_ISOLATED, STORAGE_DELETE_NETWORK, STORAGE_GET_ISOLATED,
        STORAGE_GET_NETWORK, STORAGE_SET_ISOLATED, STORAGE_SET_NETWORK,
    },
};

use crate::{ExtensionError, ExtensionResult, RpcClient};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Persistent state of the thread, in the scope its storage binding grants.
///
/// The scoping key is fixed when the extension is built. A program cannot name another orb,
/// sector or provider through this API.
#[derive(Debug, Clone)]
pub struct StorageExtension {
    client: RpcClient,
    key: StorageKey,
}

#[derive(Debug, Clone)]
enum StorageKey {
    Isolated {
        orb_id: i64,
        provider_id: String,
    },
    Network {
        sector_id: i64,
        chain: String,
        provider_id: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl StorageExtension {
    /// Builds the extension from a descriptor binding.
    pub fn from_binding(binding: &StorageBinding) -> ExtensionResult<Self> {
        Self::with_client(binding, RpcClient::new(binding.get_rpc_url()))
    }

    /// Builds the extension from a descriptor binding, sending calls through `client`.
    pub fn with_client(binding: &StorageBinding, client: RpcClient) -> ExtensionResult<Self> {
        let provider_id = binding.get_provider_id().clone();
        let key = match binding.get_scope() {
            StorageScope::Isolated => StorageKey::Isolated {
                orb_id: *binding.get_orb_id(),
                provider_id,
            },
            StorageScope::Network => {
                let chain = binding.get_chain().clone().ok_or_else(|| {
                    ExtensionError::Environment("network storage binding has no chain".to_string())
                })?;
                StorageKey::Network {
                    sector_id: *binding.get_sector_id(),
                    chain,
                    provider_id,
                }
            }
        };

        Ok(Self { client, key })
    }

    /// The scope of this storage.
    pub fn scope(&self) -> StorageScope {
        match self.key {
            StorageKey::Isolated { .. } => StorageScope::Isolated,
            StorageKey::Network { .. } => StorageScope::Network,
        }
    }

    /// Reads the stored state. `None` when nothing has been written; a stored `null` reads
    /// back as `Some(Value::Null)`.
    pub async fn get(&self) -> ExtensionResult<Option<Value>> {
        let method = match self.key {
            StorageKey::Isolated { .. } => STORAGE_GET_ISOLATED,
            StorageKey::Network { .. } => STORAGE_GET_NETWORK,
        };

        match self.client.call(method, self.key.params(None)).await? {
            Value::Null => Ok(None),
            Value::Object(mut stored) if stored.contains_key("data") => Ok(stored.remove("data")),
            other => Err(ExtensionError::Protocol(format!(
                "expected stored state or null, got {}",
                other
            ))),
        }
    }

    /// Replaces the stored state with `data`.
    pub async fn set(&self, data: &Value) -> ExtensionResult<()> {
        let method = match self.key {
            StorageKey::Isolated { .. } => STORAGE_SET_ISOLATED,
            StorageKey::Network { .. } => STORAGE_SET_NETWORK,
        };

        self.client.call(method, self.key.params(Some(data))).await?;
        Ok(())
    }

    /// Removes the stored state. Deleting absent state succeeds.
    pub async fn delete(&self) -> ExtensionResult<()> {
        let method = match self.key {
            StorageKey::Isolated { .. } => STORAGE_DELETE_ISOLATED,
            StorageKey::Network { .. } => STORAGE_DELETE_NETWORK,
        };

        self.client.call(method, self.key.params(None)).await?;
        Ok(())
    }
}

impl StorageKey {
    fn params(&self, data: Option<&Value>) -> Value {
        let mut params = match self {
            StorageKey::Isolated {
                orb_id,
                provider_id,
            } => json!({ "orbId": orb_id, "providerId": provider_id }),
            StorageKey::Network {
                sector_id,
                chain,
                provider_id,
            } => json!({ "sectorId": sector_id, "chain": chain, "providerId": provider_id }),
        };

        if let (Some(data), Value::Object(map)) = (data, &mut params) {
            map.insert("data".to_string(), data.clone());
        }

        params
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{descriptor, TestHost};

    #[tokio::test]
    async fn test_isolated_storage_round_trip() -> anyhow::Result<()> {
        let host = TestHost::start().await?;
        let descriptor = descriptor(&host, "uniswap", &["storage::isolated"], 1, "ethereum").await?;
        let storage = StorageExtension::from_binding(descriptor.storage_binding().unwrap())?;

        assert_eq!(storage.scope(), StorageScope::Isolated);
        assert_eq!(storage.get().await?, None);

        storage.set(&json!({ "position": 3 })).await?;
        assert_eq!(storage.get().await?, Some(json!({ "position": 3 })));

        storage.delete().await?;
        assert_eq!(storage.get().await?, None);
        storage.delete().await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_isolated_storage_is_per_orb() -> anyhow::Result<()> {
        let host = TestHost::start().await?;
        let first = descriptor(&host, "uniswap", &["storage::isolated"], 1, "ethereum").await?;
        let second = descriptor(&host, "uniswap", &["storage::isolated"], 2, "ethereum").await?;
        let first = StorageExtension::from_binding(first.storage_binding().unwrap())?;
        let second = StorageExtension::from_binding(second.storage_binding().unwrap())?;

        first.set(&json!("one")).await?;

        assert_eq!(first.get().await?, Some(json!("one")));
        assert_eq!(second.get().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_network_storage_is_shared_within_sector_and_chain() -> anyhow::Result<()> {
        let host = TestHost::start().await?;
        let first = descriptor(&host, "curve", &["storage::network::pool"], 1, "ethereum").await?;
        let second = descriptor(&host, "curve", &["storage::network::pool"], 2, "ethereum").await?;
        let other_chain = descriptor(&host, "curve", &["storage::network::pool"], 3, "polygon").await?;
        let first = StorageExtension::from_binding(first.storage_binding().unwrap())?;
        let second = StorageExtension::from_binding(second.storage_binding().unwrap())?;
        let other_chain = StorageExtension::from_binding(other_chain.storage_binding().unwrap())?;

        assert_eq!(first.scope(), StorageScope::Network);
        first.set(&json!({ "liquidity": 100 })).await?;

        assert_eq!(second.get().await?, Some(json!({ "liquidity": 100 })));
        assert_eq!(other_chain.get().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_stored_null_is_not_a_miss() -> anyhow::Result<()> {
        let host = TestHost::start().await?;
        let descriptor = descriptor(&host, "aave", &["storage::isolated"], 2, "ethereum").await?;
        let storage = StorageExtension::from_binding(descriptor.storage_binding().unwrap())?;

        assert_eq!(storage.get().await?, None);

        storage.set(&Value::Null).await?;
        assert_eq!(storage.get().await?, Some(Value::Null));
        Ok(())
    }
}
