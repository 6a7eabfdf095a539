//! Implementation of the `phoenix-board migrate` command.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::adapters::sqlite::{
    all_embedded_migrations, counter_migrations, create_pool, database_url, Migrator, PoolConfig,
};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, CounterBackend};

/// Result of `phoenix-board migrate`.
#[derive(Debug, Serialize)]
pub struct MigrateOutput {
    /// Board database path.
    pub database: String,
    /// Migrations applied to the board database.
    pub applied: usize,
    /// Board schema version after the run.
    pub schema_version: i64,
    /// Present when counters are kept in SQLite.
    pub counter_database: Option<String>,
    /// Migrations applied to the counter database.
    pub counter_applied: usize,
}

impl CommandOutput for MigrateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Applied {} migration(s) to {} (schema version {})",
            self.applied, self.database, self.schema_version
        )];
        if let Some(ref counters) = self.counter_database {
            lines.push(format!("Applied {} migration(s) to {}", self.counter_applied, counters));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Apply pending migrations and report what changed.
pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let pool = create_pool(&database_url(&config.database.path), Some(PoolConfig::from(&config.database)))
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path))?;
    let migrator = Migrator::new(pool.clone());
    let applied = migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Failed to migrate board database")?;
    let schema_version = migrator.get_current_version().await?;
    pool.close().await;

    let (counter_database, counter_applied) = match config.counter_store.backend {
        CounterBackend::Memory => (None, 0),
        CounterBackend::Sqlite => {
            let path = &config.counter_store.path;
            let pool = create_pool(&database_url(path), None)
                .await
                .with_context(|| format!("Failed to open counter database {path}"))?;
            let applied = Migrator::new(pool.clone())
                .run_embedded_migrations(counter_migrations())
                .await
                .context("Failed to migrate counter database")?;
            pool.close().await;
            (Some(path.clone()), applied)
        }
    };

    output(
        &MigrateOutput {
            database: config.database.path.clone(),
            applied,
            schema_version,
            counter_database,
            counter_applied,
        },
        json_mode,
    );
    Ok(())
}
