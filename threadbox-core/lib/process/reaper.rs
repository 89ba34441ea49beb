use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::service::ThreadService;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Background task retiring idle and dead threads at a fixed interval, independent of
/// traffic.
///
/// A failing sweep is logged and the next one runs on schedule.
#[derive(Debug)]
pub struct IdleReaper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl IdleReaper {
    /// Starts sweeping `service` every `interval`. The first sweep runs one interval from now.
    pub fn start(service: Arc<ThreadService>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut timer = time::interval_at(Instant::now() + interval, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!("idle reaper started, sweeping every {:?}", interval);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = timer.tick() => {}
                }

                match service.cleanup_unused_threads().await {
                    Ok(stats) if stats.expired > 0 || stats.dead > 0 => tracing::info!(
                        "idle reaper retired {} expired and {} dead threads, {} remaining",
                        stats.expired,
                        stats.dead,
                        stats.remaining
                    ),
                    Ok(stats) => {
                        tracing::debug!("idle reaper found nothing to retire ({} threads)", stats.remaining)
                    }
                    Err(e) => tracing::error!("idle reaper sweep failed: {}", e),
                }
            }

            tracing::info!("idle reaper stopped");
        });

        Self { cancel, handle }
    }

    /// Starts sweeping at the interval configured on the service.
    pub fn start_with_config(service: Arc<ThreadService>) -> Self {
        let interval = *service.config().get_reaper_interval();
        Self::start(service, interval)
    }

    /// Stops the reaper and waits for an in-progress sweep to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("idle reaper task failed: {}", e);
        }
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
        config::RegistryConfig,
        process::{testing::FakeLauncher, ProcessRegistry},
        provider::{ProviderCatalog, ThreadProvider, ThreadType},
        service::ThreadRequest,
    };

    #[tokio::test]
    async fn test_reaper_retires_idle_threads_on_its_own() {
        let mut catalog = ProviderCatalog::new();
        catalog
            .register(
                ThreadProvider::builder()
                    .id("stargate")
                    .source("export default {}")
                    .thread_type(ThreadType::Bridge)
                    .build(),
            )
            .unwrap();

        let config = RegistryConfig::builder()
            .port_range((43300, 43320))
            .thread_ttl(Duration::from_millis(50))
            .build();
        let registry =
            ProcessRegistry::new(config, Arc::new(catalog), FakeLauncher::new()).unwrap();
        let service = Arc::new(ThreadService::new(registry));

        service
            .get_or_serve_thread(&ThreadRequest {
                orb_id: 1,
                sector_id: 1,
                chain: "base".to_string(),
                provider_id: "stargate".to_string(),
                config: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(service.list_threads().await.len(), 1);

        let reaper = IdleReaper::start(service.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(400)).await;
        reaper.stop().await;

        assert!(service.list_threads().await.is_empty());
    }
}
