//! SQLite database migration management.

use sqlx::SqlitePool;
use thiserror::Error;

/// Failures while applying schema migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration's SQL failed; nothing after it was applied.
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError {
        /// Version that failed.
        version: i64,
        /// Underlying error.
        #[source]
        source: sqlx::Error,
    },
    /// The schema version table could not be read.
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

/// One versioned schema step.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Monotonic version recorded once applied.
    pub version: i64,
    /// Short label stored next to the version.
    pub description: String,
    /// Statements run inside one transaction.
    pub sql: String,
}

/// Applies migrations in version order, skipping ones already recorded.
pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    /// Migrator over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply every migration newer than the recorded schema version.
    /// Returns the number applied.
    pub async fn run_embedded_migrations(&self, migrations: Vec<Migration>) -> Result<usize, MigrationError> {
        self.ensure_migrations_table().await?;
        let current_version = self.get_current_version().await?;
        let mut pending: Vec<_> = migrations.into_iter().filter(|m| m.version > current_version).collect();
        pending.sort_by_key(|m| m.version);

        if pending.is_empty() {
            return Ok(0);
        }

        for migration in &pending {
            self.apply_migration(migration).await?;
            tracing::info!(version = migration.version, description = %migration.description, "applied migration");
        }

        Ok(pending.len())
    }

    async fn ensure_migrations_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now')),
                description TEXT
            )"
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrationError::ExecutionError { version: 0, source: e })?;
        Ok(())
    }

    /// Highest applied version, 0 on a fresh database.
    pub async fn get_current_version(&self) -> Result<i64, MigrationError> {
        let result: Option<(i64,)> = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_optional(&self.pool)
            .await
            .map_err(MigrationError::VersionCheckError)?;
        Ok(result.map(|(v,)| v).unwrap_or(0))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<(), MigrationError> {
        let to_error = |e| MigrationError::ExecutionError { version: migration.version, source: e };
        let mut tx = self.pool.begin().await.map_err(to_error)?;

        sqlx::raw_sql(&migration.sql).execute(&mut *tx).await.map_err(to_error)?;
        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(to_error)?;

        tx.commit().await.map_err(to_error)?;
        Ok(())
    }
}

fn board_schema_migration() -> Migration {
    Migration {
        version: 1,
        description: "Agents and task board".to_string(),
        sql: include_str!("../../../migrations/001_board_schema.sql").to_string(),
    }
}

fn rate_counters_migration() -> Migration {
    Migration {
        version: 1,
        description: "Rate limiter counters".to_string(),
        sql: include_str!("../../../migrations/counters/001_rate_counters.sql").to_string(),
    }
}

/// Migrations for the durable board database.
pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![board_schema_migration()]
}

/// Migrations for the counter store database.
pub fn counter_migrations() -> Vec<Migration> {
    vec![rate_counters_migration()]
}
