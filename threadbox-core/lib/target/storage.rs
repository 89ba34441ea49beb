use std::{fmt, sync::Arc};

use chrono::Utc;
use serde_json::Value;
use sqlx::{Pool, Sqlite};

use crate::{ThreadboxError, ThreadboxResult};

use super::OrbDirectory;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Provider state storage, in two scopes.
///
/// Isolated state belongs to one (orb, provider) pair and no other orb can see it. Network
/// state belongs to a (sector, chain, provider) triple and is shared by every orb of that
/// sector trading on that chain. Every write is a single upsert statement.
///
/// Every call first checks the orb or sector against the directory, so state is never
/// read or written for an owner the host does not know.
#[derive(Clone)]
pub struct StorageTarget {
    pool: Pool<Sqlite>,
    directory: Arc<dyn OrbDirectory>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl StorageTarget {
    /// Creates a target over `pool`, checking owners through `directory`.
    pub fn new(pool: Pool<Sqlite>, directory: Arc<dyn OrbDirectory>) -> Self {
        Self { pool, directory }
    }

    /// Reads the isolated state of `provider_id` for `orb_id`.
    pub async fn get_isolated(&self, orb_id: i64, provider_id: &str) -> ThreadboxResult<Option<Value>> {
        self.require_orb(orb_id).await?;

        let data: Option<String> = sqlx::query_scalar(
            "SELECT data FROM isolated_storage WHERE orb_id = ? AND provider_id = ?",
        )
        .bind(orb_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        decode(data)
    }

    /// Replaces the isolated state of `provider_id` for `orb_id`.
    pub async fn set_isolated(&self, orb_id: i64, provider_id: &str, data: &Value) -> ThreadboxResult<()> {
        self.require_orb(orb_id).await?;

        sqlx::query(
            "INSERT INTO isolated_storage (orb_id, provider_id, data, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (orb_id, provider_id) \
             DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        )
        .bind(orb_id)
        .bind(provider_id)
        .bind(serde_json::to_string(data)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!("stored isolated state for orb {} provider {}", orb_id, provider_id);
        Ok(())
    }

    /// Deletes the isolated state of `provider_id` for `orb_id`. Deleting nothing is fine.
    pub async fn delete_isolated(&self, orb_id: i64, provider_id: &str) -> ThreadboxResult<()> {
        self.require_orb(orb_id).await?;

        sqlx::query("DELETE FROM isolated_storage WHERE orb_id = ? AND provider_id = ?")
            .bind(orb_id)
            .bind(provider_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Reads the network state of `provider_id` for `sector_id` on `chain`.
    pub async fn get_network(
        &self,
        sector_id: i64,
        chain: &str,
        provider_id: &str,
    ) -> ThreadboxResult<Option<Value>> {
        self.require_sector(sector_id).await?;

        let data: Option<String> = sqlx::query_scalar(
            "SELECT data FROM network_storage WHERE sector_id = ? AND chain = ? AND provider_id = ?",
        )
        .bind(sector_id)
        .bind(chain)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        decode(data)
    }

    /// Replaces the network state of `provider_id` for `sector_id` on `chain`.
    pub async fn set_network(
        &self,
        sector_id: i64,
        chain: &str,
        provider_id: &str,
        data: &Value,
    ) -> ThreadboxResult<()> {
        self.require_sector(sector_id).await?;

        sqlx::query(
            "INSERT INTO network_storage (sector_id, chain, provider_id, data, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (sector_id, chain, provider_id) \
             DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        )
        .bind(sector_id)
        .bind(chain)
        .bind(provider_id)
        .bind(serde_json::to_string(data)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            "stored network state for sector {} on {} provider {}",
            sector_id,
            chain,
            provider_id
        );
        Ok(())
    }

    /// Deletes the network state of `provider_id` for `sector_id` on `chain`.
    pub async fn delete_network(&self, sector_id: i64, chain: &str, provider_id: &str) -> ThreadboxResult<()> {
        self.require_sector(sector_id).await?;

        sqlx::query(
            "DELETE FROM network_storage WHERE sector_id = ? AND chain = ? AND provider_id = ?",
        )
        .bind(sector_id)
        .bind(chain)
        .bind(provider_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn require_orb(&self, orb_id: i64) -> ThreadboxResult<()> {
        let orb = self
            .directory
            .get_orb(orb_id)
            .await?
            .ok_or(ThreadboxError::OrbNotFound(orb_id))?;

        self.require_sector(orb.sector_id).await
    }

    async fn require_sector(&self, sector_id: i64) -> ThreadboxResult<()> {
        match self.directory.get_sector(sector_id).await? {
            Some(_) => Ok(()),
            None => Err(ThreadboxError::SectorNotFound(sector_id)),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Debug for StorageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageTarget")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn decode(data: Option<String>) -> ThreadboxResult<Option<Value>> {
    data.map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(Into::into)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::target::{get_memory_pool, SqliteOrbDirectory, TradingMode, STORE_DB_MIGRATOR};

    async fn target() -> StorageTarget {
        let pool = get_memory_pool(&STORE_DB_MIGRATOR).await.unwrap();
        let directory = SqliteOrbDirectory::new(pool.clone());
        for sector_id in [1, 10, 11] {
            directory.upsert_sector(sector_id, TradingMode::Paper).await.unwrap();
        }
        directory.upsert_orb(1, 10, "ethereum").await.unwrap();
        directory.upsert_orb(2, 10, "ethereum").await.unwrap();
        directory.upsert_orb(3, 11, "base").await.unwrap();

        StorageTarget::new(pool, Arc::new(directory))
    }

    #[tokio::test]
    async fn test_isolated_state_is_private_to_orb_and_provider() -> anyhow::Result<()> {
        let storage = target().await;

        storage.set_isolated(1, "uniswap", &json!({ "position": 5 })).await?;

        assert_eq!(
            storage.get_isolated(1, "uniswap").await?,
            Some(json!({ "position": 5 }))
        );
        assert_eq!(storage.get_isolated(2, "uniswap").await?, None);
        assert_eq!(storage.get_isolated(1, "curve").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_network_state_is_shared_within_sector_and_chain() -> anyhow::Result<()> {
        let storage = target().await;

        storage
            .set_network(10, "ethereum", "uniswap", &json!({ "pools": ["ETH/USDC"] }))
            .await?;

        // Any orb of sector 10 on ethereum reads the same key.
        assert_eq!(
            storage.get_network(10, "ethereum", "uniswap").await?,
            Some(json!({ "pools": ["ETH/USDC"] }))
        );
        assert_eq!(storage.get_network(10, "base", "uniswap").await?, None);
        assert_eq!(storage.get_network(11, "ethereum", "uniswap").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_overwrites_and_delete_is_idempotent() -> anyhow::Result<()> {
        let storage = target().await;

        storage.set_isolated(1, "uniswap", &json!(1)).await?;
        storage.set_isolated(1, "uniswap", &json!(2)).await?;
        assert_eq!(storage.get_isolated(1, "uniswap").await?, Some(json!(2)));

        storage.delete_isolated(1, "uniswap").await?;
        storage.delete_isolated(1, "uniswap").await?;
        assert_eq!(storage.get_isolated(1, "uniswap").await?, None);

        storage.set_network(1, "solana", "jupiter", &json!("a")).await?;
        storage.set_network(1, "solana", "jupiter", &json!("b")).await?;
        assert_eq!(storage.get_network(1, "solana", "jupiter").await?, Some(json!("b")));

        storage.delete_network(1, "solana", "jupiter").await?;
        storage.delete_network(1, "solana", "jupiter").await?;
        assert_eq!(storage.get_network(1, "solana", "jupiter").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_null_is_stored_not_missing() -> anyhow::Result<()> {
        let storage = target().await;

        storage.set_isolated(3, "aave", &Value::Null).await?;
        assert_eq!(storage.get_isolated(3, "aave").await?, Some(Value::Null));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_owners_are_rejected() -> anyhow::Result<()> {
        let storage = target().await;

        let set = storage.set_isolated(99, "uniswap", &json!(1)).await;
        assert!(matches!(set, Err(ThreadboxError::OrbNotFound(99))));

        let get = storage.get_isolated(99, "uniswap").await;
        assert!(matches!(get, Err(ThreadboxError::OrbNotFound(99))));

        let set = storage.set_network(42, "ethereum", "uniswap", &json!(1)).await;
        assert!(matches!(set, Err(ThreadboxError::SectorNotFound(42))));

        let delete = storage.delete_network(42, "ethereum", "uniswap").await;
        assert!(matches!(delete, Err(ThreadboxError::SectorNotFound(42))));

        // Nothing was written for the unknown owners.
        let rows: i64 = sqlx::query_scalar(
            "SELECT (SELECT COUNT(*) FROM isolated_storage) + (SELECT COUNT(*) FROM network_storage)",
        )
        .fetch_one(&storage.pool)
        .await?;
        assert_eq!(rows, 0);
        Ok(())
    }
}
