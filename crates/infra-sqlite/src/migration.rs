// Migration Runner

use sqlx::SqlitePool;
use tracing::{debug, info};
use truckq_core::error::{AppError, Result};

/// A schema step; applied once, in `version` order
struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Snapshot blobs",
    sql: include_str!("../migrations/001_initial_schema.sql"),
}];

fn db_error(err: sqlx::Error) -> AppError {
    AppError::Database(format!("Migration failed: {}", err))
}

/// Highest applied version, 0 on a fresh database
async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
    )
    .fetch_one(pool)
    .await
    .map_err(db_error)?;

    if tables == 0 {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
    Ok(version.unwrap_or(0))
}

/// Bring the snapshot schema up to date
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let from = current_version(pool).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > from).collect();

    if pending.is_empty() {
        debug!(version = from, "Snapshot schema up to date");
        return Ok(());
    }

    for migration in pending {
        info!(
            version = migration.version,
            description = migration.description,
            "Applying migration"
        );
        apply_migration(pool, migration).await?;
    }

    info!(from = from, to = current_version(pool).await?, "Migrations applied");
    Ok(())
}

/// Statements of a migration file, comment lines dropped
fn statements(sql: &str) -> impl Iterator<Item = String> + '_ {
    sql.split(';')
        .map(|statement| {
            statement
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
}

/// Run one migration and record its version in the same transaction
async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await.map_err(db_error)?;

    for statement in statements(migration.sql) {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
    }

    sqlx::query(
        "INSERT INTO schema_version (version, applied_at) \
         VALUES (?, CAST(strftime('%s', 'now') AS INTEGER) * 1000)",
    )
    .bind(migration.version)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)
}
