//! JSON-RPC 2.0 wire format between threads and the host.
//!
//! The host serves these on `POST /rpc/storage` and `POST /rpc/wallet`; the extension shim
//! inside each thread speaks them. Both sides share the definitions below.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ThreadboxError;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// JSON-RPC version, always "2.0".
pub const JSONRPC_VERSION: &str = "2.0";

/// Reads isolated state. Answers `{ "data": .. }`, or `null` when nothing is stored.
pub const STORAGE_GET_ISOLATED: &str = "storage.getIsolated";

/// Writes isolated state.
pub const STORAGE_SET_ISOLATED: &str = "storage.setIsolated";

/// Deletes isolated state.
pub const STORAGE_DELETE_ISOLATED: &str = "storage.deleteIsolated";

/// Reads network state. Answers like [`STORAGE_GET_ISOLATED`].
pub const STORAGE_GET_NETWORK: &str = "storage.getNetwork";

/// Writes network state.
pub const STORAGE_SET_NETWORK: &str = "storage.setNetwork";

/// Deletes network state.
pub const STORAGE_DELETE_NETWORK: &str = "storage.deleteNetwork";

/// Looks up the orb's wallet address.
pub const WALLET_GET_ADDRESS: &str = "wallet.getAddress";

/// Looks up the orb's wallet balance.
pub const WALLET_GET_BALANCE: &str = "wallet.getBalance";

/// Signs a transaction.
pub const WALLET_SIGN_TRANSACTION: &str = "wallet.signTransaction";

/// Signs and broadcasts a transaction.
pub const WALLET_SEND_TRANSACTION: &str = "wallet.sendTransaction";

/// Signs a message.
pub const WALLET_SIGN_MESSAGE: &str = "wallet.signMessage";

/// The body is not valid JSON.
pub const PARSE_ERROR: i32 = -32700;

/// The body is not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;

/// No such method on this route.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// The params do not match the method.
pub const INVALID_PARAMS: i32 = -32602;

/// Unexpected host failure.
pub const INTERNAL_ERROR: i32 = -32603;

/// A chain wallet service failed.
pub const WALLET_SERVICE_ERROR: i32 = -32000;

/// The orb does not belong to the claimed sector and chain.
pub const OWNERSHIP_ERROR: i32 = -32001;

/// The chain does not support the operation.
pub const NOT_IMPLEMENTED_ERROR: i32 = -32002;

/// The orb or sector does not exist.
pub const NOT_FOUND_ERROR: i32 = -32003;

/// The thread holds no grant for the wallet operation.
pub const ACCESS_DENIED_ERROR: i32 = -32004;

//--------------------------------------------------------------------------------------------------
// Types: JSON-RPC Structures
//--------------------------------------------------------------------------------------------------

/// JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version, must be "2.0".
    pub jsonrpc: String,

    /// Method name.
    pub method: String,

    /// Method parameters.
    #[serde(default)]
    pub params: Value,

    /// Request id. Absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

/// JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version, always "2.0".
    pub jsonrpc: String,

    /// Result of the call, if it succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error details, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,

    /// Id of the request answered.
    pub id: Value,
}

/// JSON-RPC error.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,

    /// Error message.
    pub message: String,

    /// Optional error data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

//--------------------------------------------------------------------------------------------------
// Types: Method Parameters
//--------------------------------------------------------------------------------------------------

/// Params of `storage.getIsolated` and `storage.deleteIsolated`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolatedStorageParams {
    /// Orb the state belongs to.
    pub orb_id: i64,

    /// Provider the state belongs to.
    pub provider_id: String,
}

/// Params of `storage.setIsolated`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetIsolatedStorageParams {
    /// Orb the state belongs to.
    pub orb_id: i64,

    /// Provider the state belongs to.
    pub provider_id: String,

    /// The new state.
    pub data: Value,
}

/// Params of `storage.getNetwork` and `storage.deleteNetwork`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStorageParams {
    /// Sector the state belongs to.
    pub sector_id: i64,

    /// Chain the state belongs to.
    pub chain: String,

    /// Provider the state belongs to.
    pub provider_id: String,
}

/// Params of `storage.setNetwork`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetNetworkStorageParams {
    /// Sector the state belongs to.
    pub sector_id: i64,

    /// Chain the state belongs to.
    pub chain: String,

    /// Provider the state belongs to.
    pub provider_id: String,

    /// The new state.
    pub data: Value,
}

/// Params of `wallet.getAddress`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletScopeParams {
    /// Orb the call is made for.
    pub orb_id: i64,

    /// Sector the caller claims the orb belongs to.
    pub sector_id: i64,

    /// Chain the caller claims the orb trades on.
    pub chain: String,

    /// Wallet grant issued to the calling thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<String>,
}

/// Params of `wallet.getBalance`, `wallet.signTransaction` and `wallet.sendTransaction`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPayloadParams {
    /// Orb the call is made for.
    pub orb_id: i64,

    /// Sector the caller claims the orb belongs to.
    pub sector_id: i64,

    /// Chain the caller claims the orb trades on.
    pub chain: String,

    /// Wallet grant issued to the calling thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<String>,

    /// Chain-specific payload: a balance query or a transaction.
    #[serde(default)]
    pub payload: Value,
}

/// Params of `wallet.signMessage`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageParams {
    /// Orb the call is made for.
    pub orb_id: i64,

    /// Sector the caller claims the orb belongs to.
    pub sector_id: i64,

    /// Chain the caller claims the orb trades on.
    pub chain: String,

    /// Wallet grant issued to the calling thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<String>,

    /// Message to sign.
    pub message: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl JsonRpcRequest {
    /// Creates a request.
    pub fn new(method: impl Into<String>, params: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }
}

impl JsonRpcResponse {
    /// Creates a successful response.
    pub fn success(result: Value, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Creates an error response.
    pub fn error(error: JsonRpcError, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Splits the response into its result or error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

impl JsonRpcError {
    /// Creates an error without data.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// The body could not be parsed.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(PARSE_ERROR, message)
    }

    /// The request object is malformed.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, message)
    }

    /// The method does not exist on this route.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {}", method))
    }

    /// The params do not fit the method.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<&ThreadboxError> for JsonRpcError {
    fn from(error: &ThreadboxError) -> Self {
        let code = match error {
            ThreadboxError::OwnershipMismatch { .. } => OWNERSHIP_ERROR,
            ThreadboxError::AccessDenied { .. } => ACCESS_DENIED_ERROR,
            ThreadboxError::NotImplemented { .. } => NOT_IMPLEMENTED_ERROR,
            ThreadboxError::OrbNotFound(_) | ThreadboxError::SectorNotFound(_) => NOT_FOUND_ERROR,
            ThreadboxError::Wallet(_) => WALLET_SERVICE_ERROR,
            ThreadboxError::InvalidPermission(_) => INVALID_PARAMS,
            _ => INTERNAL_ERROR,
        };

        let message = match code {
            INTERNAL_ERROR => "internal error".to_string(),
            _ => error.to_string(),
        };

        Self::new(code, message)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_codes_are_distinct_per_kind() {
        let ownership = JsonRpcError::from(&ThreadboxError::OwnershipMismatch {
            orb_id: 1,
            sector_id: 2,
            chain: "ethereum".to_string(),
        });
        let not_implemented = JsonRpcError::from(&ThreadboxError::NotImplemented {
            operation: "signMessage".to_string(),
            chain: "solana".to_string(),
        });
        let denied = JsonRpcError::from(&ThreadboxError::AccessDenied {
            operation: "sendTransaction".to_string(),
        });
        let internal = JsonRpcError::from(&ThreadboxError::Config("disk on fire".to_string()));

        assert_eq!(ownership.code, OWNERSHIP_ERROR);
        assert_eq!(denied.code, ACCESS_DENIED_ERROR);
        assert_eq!(not_implemented.code, NOT_IMPLEMENTED_ERROR);
        assert_eq!(internal.code, INTERNAL_ERROR);
        assert_eq!(internal.message, "internal error");
    }

    #[test]
    fn test_response_shape() {
        let ok = serde_json::to_value(JsonRpcResponse::success(json!(null), json!(1))).unwrap();
        assert_eq!(ok, json!({ "jsonrpc": "2.0", "result": null, "id": 1 }));

        let err = serde_json::to_value(JsonRpcResponse::error(
            JsonRpcError::method_not_found("storage.nope"),
            Value::Null,
        ))
        .unwrap();
        assert_eq!(err["error"]["code"], json!(METHOD_NOT_FOUND));
        assert!(err.get("result").is_none());
    }

    #[test]
    fn test_params_use_camel_case() {
        let params: SetNetworkStorageParams = serde_json::from_value(json!({
            "sectorId": 4,
            "chain": "base",
            "providerId": "aerodrome",
            "data": { "tick": 12 }
        }))
        .unwrap();

        assert_eq!(params.sector_id, 4);
        assert_eq!(params.data, json!({ "tick": 12 }));

        let params: WalletScopeParams =
            serde_json::from_value(json!({ "orbId": 1, "sectorId": 2, "chain": "base" })).unwrap();
        assert_eq!(params.grant, None);
    }
}
