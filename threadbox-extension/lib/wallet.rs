use serde_json::{json, Value};
use threadbox_core::{
    descriptor::WalletBinding,
    permission::WalletAccess,
    rpc::{
        WALLET_GET_ADDRESS, WALLET_GET_BALANCE, WALLET_SEND_TRANSACTION, WALLET_SIGN_MESSAGE,
        WALLET_SIGN_TRANSACTION,
    },
};

use crate::{ExtensionError, ExtensionResult, RpcClient};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The orb's wallet, as far as the wallet binding grants it.
///
/// Read access covers address and balance lookups. Signing and sending need sign access and
/// are refused locally otherwise, before any call reaches the host. Every call carries the
/// binding's grant id, which the host checks on its own.
#[derive(Debug, Clone)]
pub struct WalletExtension {
    client: RpcClient,
    access: WalletAccess,
    orb_id: i64,
    sector_id: i64,
    chain: String,
    grant: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl WalletExtension {
    /// Builds the extension from a descriptor binding.
    pub fn from_binding(binding: &WalletBinding) -> Self {
        Self::with_client(binding, RpcClient::new(binding.get_rpc_url()))
    }

    /// Builds the extension from a descriptor binding, sending calls through `client`.
    pub fn with_client(binding: &WalletBinding, client: RpcClient) -> Self {
        Self {
            client,
            access: *binding.get_access(),
            orb_id: *binding.get_orb_id(),
            sector_id: *binding.get_sector_id(),
            chain: binding.get_chain().clone(),
            grant: binding.get_grant().clone(),
        }
    }

    /// The granted access level.
    pub fn access(&self) -> WalletAccess {
        self.access
    }

    /// The chain the orb trades on.
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// The orb's wallet address.
    pub async fn get_address(&self) -> ExtensionResult<String> {
        let result = self.client.call(WALLET_GET_ADDRESS, self.scope()).await?;
        match result {
            Value::String(address) => Ok(address),
            other => Err(ExtensionError::Protocol(format!(
                "expected an address string, got {}",
                other
            ))),
        }
    }

    /// The orb's balance. `query` is passed to the chain's wallet service as is.
    pub async fn get_balance(&self, query: &Value) -> ExtensionResult<Value> {
        self.client
            .call(WALLET_GET_BALANCE, self.with_payload(query))
            .await
    }

    /// Signs a transaction without broadcasting it.
    pub async fn sign_transaction(&self, transaction: &Value) -> ExtensionResult<Value> {
        self.require_sign("signTransaction")?;
        self.client
            .call(WALLET_SIGN_TRANSACTION, self.with_payload(transaction))
            .await
    }

    /// Signs and broadcasts a transaction.
    pub async fn send_transaction(&self, transaction: &Value) -> ExtensionResult<Value> {
        self.require_sign("sendTransaction")?;
        self.client
            .call(WALLET_SEND_TRANSACTION, self.with_payload(transaction))
            .await
    }

    /// Signs an arbitrary message.
    pub async fn sign_message(&self, message: &str) -> ExtensionResult<String> {
        self.require_sign("signMessage")?;

        let mut params = self.scope();
        if let Value::Object(map) = &mut params {
            map.insert("message".to_string(), Value::from(message));
        }

        match self.client.call(WALLET_SIGN_MESSAGE, params).await? {
            Value::String(signature) => Ok(signature),
            other => Err(ExtensionError::Protocol(format!(
                "expected a signature string, got {}",
                other
            ))),
        }
    }

    fn require_sign(&self, operation: &str) -> ExtensionResult<()> {
        match self.access {
            WalletAccess::Sign => Ok(()),
            WalletAccess::Read => Err(ExtensionError::NotGranted {
                operation: operation.to_string(),
            }),
        }
    }

    fn scope(&self) -> Value {
        let mut scope = json!({
            "orbId": self.orb_id,
            "sectorId": self.sector_id,
            "chain": self.chain,
        });
        if let (Some(grant), Value::Object(map)) = (&self.grant, &mut scope) {
            map.insert("grant".to_string(), Value::from(grant.as_str()));
        }
        scope
    }

    fn with_payload(&self, payload: &Value) -> Value {
        let mut params = self.scope();
        if let Value::Object(map) = &mut params {
            map.insert("payload".to_string(), payload.clone());
        }
        params
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
