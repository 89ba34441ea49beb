use std::{path::Path, str::FromStr};

use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};

use crate::ThreadboxResult;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Migrations of the threadbox store.
pub static STORE_DB_MIGRATOR: Migrator = sqlx::migrate!("lib/migrations");

const MAX_POOL_CONNECTIONS: u32 = 5;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Opens (creating if missing) the database at `db_path` and runs `migrator` on it.
pub async fn get_or_create_pool(db_path: &Path, migrator: &Migrator) -> ThreadboxResult<Pool<Sqlite>> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_POOL_CONNECTIONS)
        .connect_with(options)
        .await?;

    migrator.run(&pool).await?;
    tracing::debug!("opened store at {}", db_path.display());

    Ok(pool)
}

/// Opens a migrated in-memory database.
///
/// The pool holds a single connection that never expires, since every connection to
/// `:memory:` sees its own database.
pub async fn get_memory_pool(migrator: &Migrator) -> ThreadboxResult<Pool<Sqlite>> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    migrator.run(&pool).await?;

    Ok(pool)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_creates_file_and_tables() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("nested").join("threadbox.db");

        let pool = get_or_create_pool(&db_path, &STORE_DB_MIGRATOR).await?;
        assert!(db_path.exists());

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&pool)
                .await?;
        for table in ["isolated_storage", "network_storage", "orbs", "sectors"] {
            assert!(tables.iter().any(|name| name == table), "missing {}", table);
        }

        // Reopening runs the migrations again without complaint.
        pool.close().await;
        get_or_create_pool(&db_path, &STORE_DB_MIGRATOR).await?;
        Ok(())
    }
}
