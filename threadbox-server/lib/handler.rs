//! Request handlers for the threadbox server.
//!
//! The JSON-RPC handlers accept a single request object or a batch array. Each request is
//! answered independently; a failing request in a batch does not affect the others.
//! Requests without an `id` are notifications and get no response.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use threadbox_core::{
    rpc::{
        self, IsolatedStorageParams, NetworkStorageParams, SetIsolatedStorageParams,
        SetNetworkStorageParams, SignMessageParams, WalletPayloadParams, WalletScopeParams,
        INTERNAL_ERROR,
    },
    target::{
        GET_ADDRESS_OPERATION, GET_BALANCE_OPERATION, SEND_TRANSACTION_OPERATION,
        SIGN_MESSAGE_OPERATION, SIGN_TRANSACTION_OPERATION,
    },
    ThreadboxError,
};
use threadbox_utils::LOCALHOST_IP;

use crate::{
    error::ValidationError,
    payload::{
        CleanupResponse, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RegularMessageResponse,
        ServeThreadResponse, ThreadListResponse, ThreadRequest, JSONRPC_VERSION,
    },
    state::AppState,
    ServerResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The capability a JSON-RPC route exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RpcRoute {
    Storage,
    Wallet,
}

//--------------------------------------------------------------------------------------------------
// Functions: REST API Handlers
//--------------------------------------------------------------------------------------------------

/// Handler for health check
pub async fn health() -> ServerResult<impl IntoResponse> {
    Ok((
        StatusCode::OK,
        Json(RegularMessageResponse {
            message: "Service is healthy".to_string(),
        }),
    ))
}

/// Lists the ready threads
pub async fn list_threads(State(state): State<AppState>) -> ServerResult<impl IntoResponse> {
    let threads = state.get_threads().list_threads().await;
    Ok(Json(ThreadListResponse { threads }))
}

/// Returns the port of the thread serving the request, spawning it if needed
pub async fn serve_thread(
    State(state): State<AppState>,
    Json(request): Json<ThreadRequest>,
) -> ServerResult<impl IntoResponse> {
    if request.provider_id.trim().is_empty() {
        return Err(ValidationError::InvalidInput("providerId cannot be empty".to_string()).into());
    }

    if request.chain.trim().is_empty() {
        return Err(ValidationError::InvalidInput("chain cannot be empty".to_string()).into());
    }

    let port = state.get_threads().get_or_serve_thread(&request).await?;

    Ok(Json(ServeThreadResponse {
        port,
        url: format!("http://{}:{}", LOCALHOST_IP, port),
    }))
}

/// Runs one cleanup sweep now
pub async fn cleanup_threads(State(state): State<AppState>) -> ServerResult<impl IntoResponse> {
    let stats = state.get_threads().cleanup_unused_threads().await?;
    Ok(Json(CleanupResponse { stats }))
}

//--------------------------------------------------------------------------------------------------
// Functions: JSON-RPC Handlers
//--------------------------------------------------------------------------------------------------

/// JSON-RPC handler of the storage capability
pub async fn storage_rpc(State(state): State<AppState>, body: Bytes) -> Response {
    handle_rpc(&state, RpcRoute::Storage, &body).await
}

/// JSON-RPC handler of the wallet capability
pub async fn wallet_rpc(State(state): State<AppState>, body: Bytes) -> Response {
    handle_rpc(&state, RpcRoute::Wallet, &body).await
}

async fn handle_rpc(state: &AppState, route: RpcRoute, body: &[u8]) -> Response {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            return Json(JsonRpcResponse::error(
                JsonRpcError::parse_error(format!("parse error: {}", e)),
                Value::Null,
            ))
            .into_response();
        }
    };

    match payload {
        Value::Array(items) if items.is_empty() => Json(JsonRpcResponse::error(
            JsonRpcError::invalid_request("empty batch"),
            Value::Null,
        ))
        .into_response(),
        Value::Array(items) => {
            let mut responses = Vec::with_capacity(items.len());
            for item in items {
                if let Some(response) = handle_request(state, route, item).await {
                    responses.push(response);
                }
            }

            if responses.is_empty() {
                StatusCode::NO_CONTENT.into_response()
            } else {
                Json(responses).into_response()
            }
        }
        item => match handle_request(state, route, item).await {
            Some(response) => Json(response).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        },
    }
}

/// Answers one request object. Returns `None` for notifications.
async fn handle_request(state: &AppState, route: RpcRoute, item: Value) -> Option<JsonRpcResponse> {
    let id = item.get("id").cloned();

    let request: JsonRpcRequest = match serde_json::from_value(item) {
        Ok(request) => request,
        Err(e) => {
            return Some(JsonRpcResponse::error(
                JsonRpcError::invalid_request(format!("invalid request: {}", e)),
                id.unwrap_or(Value::Null),
            ));
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Some(JsonRpcResponse::error(
            JsonRpcError::invalid_request("invalid or missing jsonrpc version field"),
            id.unwrap_or(Value::Null),
        ));
    }

    let outcome = match route {
        RpcRoute::Storage => storage_call(state, &request.method, request.params).await,
        RpcRoute::Wallet => wallet_call(state, &request.method, request.params).await,
    };

    let id = id?;
    Some(match outcome {
        Ok(result) => JsonRpcResponse::success(result, id),
        Err(error) => JsonRpcResponse::error(error, id),
    })
}

async fn storage_call(state: &AppState, method: &str, params: Value) -> Result<Value, JsonRpcError> {
    let storage = state.get_storage();

    match method {
        rpc::STORAGE_GET_ISOLATED => {
            let p: IsolatedStorageParams = parse_params(params)?;
            let data = storage
                .get_isolated(p.orb_id, &p.provider_id)
                .await
                .map_err(rpc_error)?;
            Ok(stored(data))
        }
        rpc::STORAGE_SET_ISOLATED => {
            let p: SetIsolatedStorageParams = parse_params(params)?;
            storage
                .set_isolated(p.orb_id, &p.provider_id, &p.data)
                .await
                .map_err(rpc_error)?;
            Ok(Value::Bool(true))
        }
        rpc::STORAGE_DELETE_ISOLATED => {
            let p: IsolatedStorageParams = parse_params(params)?;
            storage
                .delete_isolated(p.orb_id, &p.provider_id)
                .await
                .map_err(rpc_error)?;
            Ok(Value::Bool(true))
        }
        rpc::STORAGE_GET_NETWORK => {
            let p: NetworkStorageParams = parse_params(params)?;
            let data = storage
                .get_network(p.sector_id, &p.chain, &p.provider_id)
                .await
                .map_err(rpc_error)?;
            Ok(stored(data))
        }
        rpc::STORAGE_SET_NETWORK => {
            let p: SetNetworkStorageParams = parse_params(params)?;
            storage
                .set_network(p.sector_id, &p.chain, &p.provider_id, &p.data)
                .await
                .map_err(rpc_error)?;
            Ok(Value::Bool(true))
        }
        rpc::STORAGE_DELETE_NETWORK => {
            let p: NetworkStorageParams = parse_params(params)?;
            storage
                .delete_network(p.sector_id, &p.chain, &p.provider_id)
                .await
                .map_err(rpc_error)?;
            Ok(Value::Bool(true))
        }
        unknown => Err(JsonRpcError::method_not_found(unknown)),
    }
}

async fn wallet_call(state: &AppState, method: &str, params: Value) -> Result<Value, JsonRpcError> {
    let wallet = state.get_wallet();

    match method {
        rpc::WALLET_GET_ADDRESS => {
            let p: WalletScopeParams = parse_params(params)?;
            authorize(
                state,
                p.grant.as_deref(),
                GET_ADDRESS_OPERATION,
                p.orb_id,
                p.sector_id,
                &p.chain,
            )
            .await?;
            let address = wallet
                .get_address(p.orb_id, p.sector_id, &p.chain)
                .await
                .map_err(rpc_error)?;
            Ok(Value::String(address))
        }
        rpc::WALLET_GET_BALANCE => {
            let p: WalletPayloadParams = parse_params(params)?;
            authorize(
                state,
                p.grant.as_deref(),
                GET_BALANCE_OPERATION,
                p.orb_id,
                p.sector_id,
                &p.chain,
            )
            .await?;
            wallet
                .get_balance(p.orb_id, p.sector_id, &p.chain, &p.payload)
                .await
                .map_err(rpc_error)
        }
        rpc::WALLET_SIGN_TRANSACTION => {
            let p: WalletPayloadParams = parse_params(params)?;
            authorize(
                state,
                p.grant.as_deref(),
                SIGN_TRANSACTION_OPERATION,
                p.orb_id,
                p.sector_id,
                &p.chain,
            )
            .await?;
            wallet
                .sign_transaction(p.orb_id, p.sector_id, &p.chain, &p.payload)
                .await
                .map_err(rpc_error)
        }
        rpc::WALLET_SEND_TRANSACTION => {
            let p: WalletPayloadParams = parse_params(params)?;
            authorize(
                state,
                p.grant.as_deref(),
                SEND_TRANSACTION_OPERATION,
                p.orb_id,
                p.sector_id,
                &p.chain,
            )
            .await?;
            wallet
                .send_transaction(p.orb_id, p.sector_id, &p.chain, &p.payload)
                .await
                .map_err(rpc_error)
        }
        rpc::WALLET_SIGN_MESSAGE => {
            let p: SignMessageParams = parse_params(params)?;
            authorize(
                state,
                p.grant.as_deref(),
                SIGN_MESSAGE_OPERATION,
                p.orb_id,
                p.sector_id,
                &p.chain,
            )
            .await?;
            let signature = wallet
                .sign_message(p.orb_id, p.sector_id, &p.chain, &p.message)
                .await
                .map_err(rpc_error)?;
            Ok(Value::String(signature))
        }
        unknown => Err(JsonRpcError::method_not_found(unknown)),
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("invalid params: {}", e)))
}

/// Checks the caller's wallet grant against the host's grant table.
async fn authorize(
    state: &AppState,
    grant: Option<&str>,
    operation: &str,
    orb_id: i64,
    sector_id: i64,
    chain: &str,
) -> Result<(), JsonRpcError> {
    state
        .get_threads()
        .grants()
        .authorize(grant, operation, orb_id, sector_id, chain)
        .await
        .map_err(rpc_error)
}

/// Wraps a stored value so a stored `null` stays distinguishable from a miss.
fn stored(data: Option<Value>) -> Value {
    match data {
        Some(data) => json!({ "data": data }),
        None => Value::Null,
    }
}

fn rpc_error(error: ThreadboxError) -> JsonRpcError {
    let rpc_error = JsonRpcError::from(&error);
    if rpc_error.code == INTERNAL_ERROR {
        tracing::error!("capability call failed: {}", error);
    } else {
        tracing::warn!("capability call rejected: {}", error);
    }
    rpc_error
}
