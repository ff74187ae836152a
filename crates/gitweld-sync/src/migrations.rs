//! Database migration management.

use crate::error::SyncResult;
use sqlx::PgPool;

/// Run all pending migrations for the engine's tables.
///
/// Migrations are embedded at compile time from the `migrations/` directory
/// and applied in filename order.
pub async fn run_migrations(pool: &PgPool) -> SyncResult<()> {
    tracing::info!("Running sync engine migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::error::SyncError::Database(e.into()))?;

    tracing::info!("Migrations completed");
    Ok(())
}
