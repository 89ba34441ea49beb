use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Pool, Sqlite};

use crate::ThreadboxResult;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Whether a sector trades with real funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TradingMode {
    /// Real funds.
    Live,

    /// Simulated funds.
    Paper,
}

/// An orb as seen by the capability targets.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrbRecord {
    /// Orb id.
    pub id: i64,

    /// Sector the orb belongs to.
    pub sector_id: i64,

    /// Chain the orb trades on.
    pub chain: String,
}

/// A sector as seen by the capability targets.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SectorRecord {
    /// Sector id.
    pub id: i64,

    /// Trading mode of the sector.
    pub trading_mode: TradingMode,
}

/// Reads orbs and sectors from the `orbs` and `sectors` tables of the store.
#[derive(Debug, Clone)]
pub struct SqliteOrbDirectory {
    pool: Pool<Sqlite>,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Source of truth for orb ownership.
///
/// The host application owns orbs and sectors. Implement this to serve them from elsewhere
/// than the threadbox store.
#[async_trait]
pub trait OrbDirectory: Send + Sync {
    /// Looks up an orb.
    async fn get_orb(&self, orb_id: i64) -> ThreadboxResult<Option<OrbRecord>>;

    /// Looks up a sector.
    async fn get_sector(&self, sector_id: i64) -> ThreadboxResult<Option<SectorRecord>>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SqliteOrbDirectory {
    /// Creates a directory over `pool`.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Inserts or updates a sector.
    pub async fn upsert_sector(&self, sector_id: i64, trading_mode: TradingMode) -> ThreadboxResult<()> {
        sqlx::query(
            "INSERT INTO sectors (id, trading_mode) VALUES (?, ?) \
             ON CONFLICT (id) DO UPDATE SET trading_mode = excluded.trading_mode",
        )
        .bind(sector_id)
        .bind(trading_mode)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or updates an orb. The sector must exist.
    pub async fn upsert_orb(&self, orb_id: i64, sector_id: i64, chain: &str) -> ThreadboxResult<()> {
        sqlx::query(
            "INSERT INTO orbs (id, sector_id, chain) VALUES (?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET sector_id = excluded.sector_id, chain = excluded.chain",
        )
        .bind(orb_id)
        .bind(sector_id)
        .bind(chain)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl OrbDirectory for SqliteOrbDirectory {
    async fn get_orb(&self, orb_id: i64) -> ThreadboxResult<Option<OrbRecord>> {
        let orb = sqlx::query_as::<_, OrbRecord>("SELECT id, sector_id, chain FROM orbs WHERE id = ?")
            .bind(orb_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(orb)
    }

    async fn get_sector(&self, sector_id: i64) -> ThreadboxResult<Option<SectorRecord>> {
        let sector =
            sqlx::query_as::<_, SectorRecord>("SELECT id, trading_mode FROM sectors WHERE id = ?")
                .bind(sector_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(sector)
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Live => f.write_str("live"),
            TradingMode::Paper => f.write_str("paper"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
