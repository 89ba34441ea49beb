use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use serde_json::Value;
use threadbox_core::rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

use crate::{ExtensionError, ExtensionResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// JSON-RPC client for one host route.
///
/// Cloning shares the connection pool and the id counter.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RpcClient {
    /// Creates a client posting to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), url)
    }

    /// Creates a client posting to `url` through `http`.
    pub fn with_http_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The route URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Calls `method` and returns its result.
    pub async fn call(&self, method: &str, params: Value) -> ExtensionResult<Value> {
        let request = JsonRpcRequest::new(method, params, Value::from(self.next_id()));
        tracing::debug!("rpc call {} to {}", method, self.url);

        let response: JsonRpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if Some(&response.id) != request.id.as_ref() {
            return Err(ExtensionError::Protocol(format!(
                "response id {} does not match request id {:?}",
                response.id, request.id
            )));
        }

        response.into_result().map_err(ExtensionError::Rpc)
    }

    /// Sends several calls in one batch. Results come back in call order, each succeeding or
    /// failing on its own.
    pub async fn batch(
        &self,
        calls: Vec<(&str, Value)>,
    ) -> ExtensionResult<Vec<Result<Value, JsonRpcError>>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<JsonRpcRequest> = calls
            .into_iter()
            .map(|(method, params)| JsonRpcRequest::new(method, params, Value::from(self.next_id())))
            .collect();

        let responses: Vec<JsonRpcResponse> = self
            .http
            .post(&self.url)
            .json(&requests)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut by_id: HashMap<String, JsonRpcResponse> = responses
            .into_iter()
            .map(|response| (response.id.to_string(), response))
            .collect();

        requests
            .iter()
            .map(|request| {
                let id = request.id.as_ref().map(Value::to_string).unwrap_or_default();
                by_id
                    .remove(&id)
                    .map(JsonRpcResponse::into_result)
                    .ok_or_else(|| {
                        ExtensionError::Protocol(format!("no response for request {}", id))
                    })
            })
            .collect()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
