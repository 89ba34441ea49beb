//! The facade the rest of the application uses to reach a provider's thread.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::RegistryConfig,
    process::{CleanupStats, ProcessRegistry, ThreadStatus},
    target::WalletGrants,
    ThreadboxError, ThreadboxResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A request for the thread running `provider_id` with `config`, on behalf of an orb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadRequest {
    /// Orb the thread acts for.
    pub orb_id: i64,

    /// Sector of the orb.
    pub sector_id: i64,

    /// Chain of the orb.
    pub chain: String,

    /// Provider to run.
    pub provider_id: String,

    /// Thread config. Together with the provider id it selects the thread.
    #[serde(default = "empty_config")]
    pub config: Value,
}

/// Serves threads to callers and keeps the registry tidy.
///
/// The orb, sector and chain of a request are bound into a thread only when that request
/// causes the spawn. Later requests with the same provider and config reuse the thread.
#[derive(Debug, Clone)]
pub struct ThreadService {
    registry: ProcessRegistry,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ThreadService {
    /// Creates a service over `registry`.
    pub fn new(registry: ProcessRegistry) -> Self {
        Self { registry }
    }

    /// The registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        self.registry.config()
    }

    /// The underlying registry.
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Wallet grants of the running threads.
    pub fn grants(&self) -> &WalletGrants {
        self.registry.grants()
    }

    /// Returns the loopback port of the thread serving `request`, spawning it if needed.
    ///
    /// Gives up after the configured serve timeout. The spawn itself keeps going, so a later
    /// call usually finds the thread ready.
    pub async fn get_or_serve_thread(&self, request: &ThreadRequest) -> ThreadboxResult<u16> {
        let timeout = *self.config().get_serve_timeout();

        match tokio::time::timeout(timeout, self.registry.get_or_spawn(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "gave up waiting {:?} for provider {} (orb {})",
                    timeout,
                    request.provider_id,
                    request.orb_id
                );
                Err(ThreadboxError::ServeTimeout(timeout))
            }
        }
    }

    /// Retires threads idle past the configured TTL, and dead ones.
    pub async fn cleanup_unused_threads(&self) -> ThreadboxResult<CleanupStats> {
        Ok(self
            .registry
            .cleanup_expired(*self.config().get_thread_ttl())
            .await)
    }

    /// Lists the ready threads.
    pub async fn list_threads(&self) -> Vec<ThreadStatus> {
        self.registry.list().await
    }

    /// Stops every thread. Returns how many were stopped.
    pub async fn shutdown(&self) -> usize {
        self.registry.shutdown().await
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn empty_config() -> Value {
    Value::Object(Default::default())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::json;

    use super::*;
    use crate::{
        process::testing::FakeLauncher,
        provider::{ProviderCatalog, ThreadProvider, ThreadType},
    };

    fn service(launcher: Arc<FakeLauncher>, first_port: u16, serve_timeout: Duration) -> ThreadService {
        let mut catalog = ProviderCatalog::new();
        catalog
            .register(
                ThreadProvider::builder()
                    .id("compound")
                    .source("export default {}")
                    .thread_type(ThreadType::Lending)
                    .permissions(vec!["wallet::read".to_string()])
                    .build(),
            )
            .unwrap();

        let config = RegistryConfig::builder()
            .port_range((first_port, first_port + 20))
            .serve_timeout(serve_timeout)
            .build();

        ThreadService::new(ProcessRegistry::new(config, Arc::new(catalog), launcher).unwrap())
    }

    #[test]
    fn test_request_deserializes_with_default_config() {
        let request: ThreadRequest = serde_json::from_value(json!({
            "orbId": 3,
            "sectorId": 9,
            "chain": "arbitrum",
            "providerId": "compound"
        }))
        .unwrap();

        assert_eq!(request.orb_id, 3);
        assert_eq!(request.config, json!({}));
    }

    #[tokio::test]
    async fn test_serve_timeout_does_not_cancel_spawn() {
        let launcher = FakeLauncher::with_startup_delay(Duration::from_millis(400));
        let service = service(launcher.clone(), 43400, Duration::from_millis(100));
        let request = ThreadRequest {
            orb_id: 1,
            sector_id: 2,
            chain: "ethereum".to_string(),
            provider_id: "compound".to_string(),
            config: json!({ "market": "USDC" }),
        };

        let result = service.get_or_serve_thread(&request).await;
        assert!(matches!(result, Err(ThreadboxError::ServeTimeout(_))));

        tokio::time::sleep(Duration::from_millis(600)).await;
        service.get_or_serve_thread(&request).await.unwrap();
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_threads() {
        let service = service(FakeLauncher::new(), 43500, Duration::from_secs(5));
        let request = ThreadRequest {
            orb_id: 1,
            sector_id: 2,
            chain: "ethereum".to_string(),
            provider_id: "compound".to_string(),
            config: json!({}),
        };

        service.get_or_serve_thread(&request).await.unwrap();

        let stats = service.cleanup_unused_threads().await.unwrap();
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.remaining, 1);
        assert_eq!(service.shutdown().await, 1);
    }
}
