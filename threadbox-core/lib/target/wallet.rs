use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::{ThreadboxError, ThreadboxResult};

use super::{OrbDirectory, TradingMode};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Operation name of [`WalletService::get_address`].
pub const GET_ADDRESS_OPERATION: &str = "getAddress";

/// Operation name of [`WalletService::get_balance`].
pub const GET_BALANCE_OPERATION: &str = "getBalance";

/// Operation name of [`WalletService::sign_transaction`].
pub const SIGN_TRANSACTION_OPERATION: &str = "signTransaction";

/// Operation name of [`WalletService::send_transaction`].
pub const SEND_TRANSACTION_OPERATION: &str = "sendTransaction";

/// Operation name of [`WalletService::sign_message`].
pub const SIGN_MESSAGE_OPERATION: &str = "signMessage";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The verified scope of one wallet call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletContext {
    /// Orb the call is made for.
    pub orb_id: i64,

    /// Sector of the orb.
    pub sector_id: i64,

    /// Chain of the orb.
    pub chain: String,

    /// Trading mode of the sector.
    pub trading_mode: TradingMode,
}

/// Chain wallet services, keyed by chain name.
#[derive(Clone, Default)]
pub struct WalletServices {
    services: HashMap<String, Arc<dyn WalletService>>,
}

/// Wallet operations on behalf of orbs, after checking the caller's scoping tuple.
///
/// The host keeps every key. A thread only ever sees addresses, balances and signatures.
#[derive(Clone)]
pub struct WalletTarget {
    directory: Arc<dyn OrbDirectory>,
    services: WalletServices,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A chain-specific wallet.
///
/// Every operation defaults to [`ThreadboxError::NotImplemented`], so a service only
/// overrides what its chain supports.
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Address of the orb's wallet.
    async fn get_address(&self, context: &WalletContext) -> ThreadboxResult<String> {
        Err(not_implemented(GET_ADDRESS_OPERATION, context))
    }

    /// Balance of the orb's wallet. `params` selects the asset, chain-specific.
    async fn get_balance(&self, context: &WalletContext, params: &Value) -> ThreadboxResult<Value> {
        let _ = params;
        Err(not_implemented(GET_BALANCE_OPERATION, context))
    }

    /// Signs a transaction without broadcasting it.
    async fn sign_transaction(&self, context: &WalletContext, transaction: &Value) -> ThreadboxResult<Value> {
        let _ = transaction;
        Err(not_implemented(SIGN_TRANSACTION_OPERATION, context))
    }

    /// Signs and broadcasts a transaction.
    async fn send_transaction(&self, context: &WalletContext, transaction: &Value) -> ThreadboxResult<Value> {
        let _ = transaction;
        Err(not_implemented(SEND_TRANSACTION_OPERATION, context))
    }

    /// Signs an arbitrary message.
    async fn sign_message(&self, context: &WalletContext, message: &str) -> ThreadboxResult<String> {
        let _ = message;
        Err(not_implemented(SIGN_MESSAGE_OPERATION, context))
    }
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl WalletServices {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` for `chain`, replacing any previous one.
    pub fn register(&mut self, chain: impl Into<String>, service: Arc<dyn WalletService>) {
        let chain = chain.into();
        tracing::info!("registered wallet service for chain {}", chain);
        self.services.insert(chain, service);
    }

    /// The service of `chain`.
    pub fn get(&self, chain: &str) -> Option<Arc<dyn WalletService>> {
        self.services.get(chain).cloned()
    }

    /// Chains with a service, sorted.
    pub fn chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self.services.keys().cloned().collect();
        chains.sort();
        chains
    }
}

impl WalletTarget {
    /// Creates a target resolving orbs through `directory`.
    pub fn new(directory: Arc<dyn OrbDirectory>, services: WalletServices) -> Self {
        Self {
            directory,
            services,
        }
    }

    /// Address of the orb's wallet.
    pub async fn get_address(&self, orb_id: i64, sector_id: i64, chain: &str) -> ThreadboxResult<String> {
        let (context, service) = self
            .resolve(GET_ADDRESS_OPERATION, orb_id, sector_id, chain)
            .await?;
        service.get_address(&context).await
    }

    /// Balance of the orb's wallet.
    pub async fn get_balance(
        &self,
        orb_id: i64,
        sector_id: i64,
        chain: &str,
        params: &Value,
    ) -> ThreadboxResult<Value> {
        let (context, service) = self
            .resolve(GET_BALANCE_OPERATION, orb_id, sector_id, chain)
            .await?;
        service.get_balance(&context, params).await
    }

    /// Signs a transaction for the orb.
    pub async fn sign_transaction(
        &self,
        orb_id: i64,
        sector_id: i64,
        chain: &str,
        transaction: &Value,
    ) -> ThreadboxResult<Value> {
        let (context, service) = self
            .resolve(SIGN_TRANSACTION_OPERATION, orb_id, sector_id, chain)
            .await?;
        tracing::info!(
            "signing transaction for orb {} on {} ({})",
            orb_id,
            chain,
            context.trading_mode
        );
        service.sign_transaction(&context, transaction).await
    }

    /// Signs and broadcasts a transaction for the orb.
    pub async fn send_transaction(
        &self,
        orb_id: i64,
        sector_id: i64,
        chain: &str,
        transaction: &Value,
    ) -> ThreadboxResult<Value> {
        let (context, service) = self
            .resolve(SEND_TRANSACTION_OPERATION, orb_id, sector_id, chain)
            .await?;
        tracing::info!(
            "sending transaction for orb {} on {} ({})",
            orb_id,
            chain,
            context.trading_mode
        );
        service.send_transaction(&context, transaction).await
    }

    /// Signs a message for the orb.
    pub async fn sign_message(
        &self,
        orb_id: i64,
        sector_id: i64,
        chain: &str,
        message: &str,
    ) -> ThreadboxResult<String> {
        let (context, service) = self
            .resolve(SIGN_MESSAGE_OPERATION, orb_id, sector_id, chain)
            .await?;
        service.sign_message(&context, message).await
    }

    /// Checks that the orb exists and belongs to `sector_id` on `chain`, then finds the
    /// chain's service.
    async fn resolve(
        &self,
        operation: &str,
        orb_id: i64,
        sector_id: i64,
        chain: &str,
    ) -> ThreadboxResult<(WalletContext, Arc<dyn WalletService>)> {
        let orb = self
            .directory
            .get_orb(orb_id)
            .await?
            .ok_or(ThreadboxError::OrbNotFound(orb_id))?;

        if orb.sector_id != sector_id || orb.chain != chain {
            tracing::warn!(
                "rejected {} for orb {}: claimed sector {} on {}, actual sector {} on {}",
                operation,
                orb_id,
                sector_id,
                chain,
                orb.sector_id,
                orb.chain
            );
            return Err(ThreadboxError::OwnershipMismatch {
                orb_id,
                sector_id,
                chain: chain.to_string(),
            });
        }

        let sector = self
            .directory
            .get_sector(sector_id)
            .await?
            .ok_or(ThreadboxError::SectorNotFound(sector_id))?;

        let service = self
            .services
            .get(chain)
            .ok_or_else(|| ThreadboxError::NotImplemented {
                operation: operation.to_string(),
                chain: chain.to_string(),
            })?;

        let context = WalletContext {
            orb_id,
            sector_id,
            chain: orb.chain,
            trading_mode: sector.trading_mode,
        };

        Ok((context, service))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Debug for WalletServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletServices")
            .field("chains", &self.chains())
            .finish()
    }
}

impl fmt::Debug for WalletTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletTarget")
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn not_implemented(operation: &str, context: &WalletContext) -> ThreadboxError {
    ThreadboxError::NotImplemented {
        operation: operation.to_string(),
        chain: context.chain.clone(),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::target::{get_memory_pool, SqliteOrbDirectory, STORE_DB_MIGRATOR};

    /// Reads only; signing stays unimplemented.
    struct ReadOnlyWallet;

    #[async_trait]
    impl WalletService for ReadOnlyWallet {
        async fn get_address(&self, context: &WalletContext) -> ThreadboxResult<String> {
            Ok(format!("0xorb{}", context.orb_id))
        }

        async fn get_balance(&self, context: &WalletContext, _params: &Value) -> ThreadboxResult<Value> {
            let amount = match context.trading_mode {
                TradingMode::Live => "12.5",
                TradingMode::Paper => "1000",
            };
            Ok(json!({ "amount": amount }))
        }
    }

    async fn target() -> WalletTarget {
        let directory = SqliteOrbDirectory::new(get_memory_pool(&STORE_DB_MIGRATOR).await.unwrap());
        directory.upsert_sector(10, TradingMode::Live).await.unwrap();
        directory.upsert_sector(20, TradingMode::Paper).await.unwrap();
        directory.upsert_orb(1, 10, "ethereum").await.unwrap();
        directory.upsert_orb(2, 20, "ethereum").await.unwrap();
        directory.upsert_orb(3, 10, "solana").await.unwrap();

        let mut services = WalletServices::new();
        services.register("ethereum", Arc::new(ReadOnlyWallet));

        WalletTarget::new(Arc::new(directory), services)
    }

    #[tokio::test]
    async fn test_delegates_with_trading_mode() -> anyhow::Result<()> {
        let wallet = target().await;

        assert_eq!(wallet.get_address(1, 10, "ethereum").await?, "0xorb1");
        assert_eq!(
            wallet.get_balance(1, 10, "ethereum", &json!({})).await?,
            json!({ "amount": "12.5" })
        );
        assert_eq!(
            wallet.get_balance(2, 20, "ethereum", &json!({})).await?,
            json!({ "amount": "1000" })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_wrong_sector_or_chain() {
        let wallet = target().await;

        let wrong_sector = wallet.get_address(1, 20, "ethereum").await;
        assert!(matches!(
            wrong_sector,
            Err(ThreadboxError::OwnershipMismatch { orb_id: 1, sector_id: 20, .. })
        ));

        let wrong_chain = wallet.get_address(1, 10, "solana").await;
        assert!(matches!(wrong_chain, Err(ThreadboxError::OwnershipMismatch { .. })));

        let missing = wallet.get_address(99, 10, "ethereum").await;
        assert!(matches!(missing, Err(ThreadboxError::OrbNotFound(99))));
    }

    #[tokio::test]
    async fn test_unsupported_chain_or_operation_is_not_implemented() {
        let wallet = target().await;

        let chain = wallet.get_address(3, 10, "solana").await;
        assert!(matches!(
            chain,
            Err(ThreadboxError::NotImplemented { ref chain, .. }) if chain == "solana"
        ));

        let operation = wallet.sign_message(1, 10, "ethereum", "hello").await;
        assert!(matches!(
            operation,
            Err(ThreadboxError::NotImplemented { ref operation, .. }) if operation == SIGN_MESSAGE_OPERATION
        ));

        let send = wallet.send_transaction(1, 10, "ethereum", &json!({ "to": "0x0" })).await;
        assert!(send.unwrap_err().is_permanent());
    }
}
