use std::time::Duration;

use phoenix_board::adapters::sqlite::{
    all_embedded_migrations, create_migrated_test_pool, create_pool, database_url, Migrator, PoolConfig,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create an in-memory SQLite database for testing
///
/// Single connection with migrations applied. Each call creates a
/// completely isolated database instance.
pub async fn setup_test_db() -> SqlitePool {
    create_migrated_test_pool()
        .await
        .expect("failed to create test database")
}

/// Create a file-backed database in `dir` with a multi-connection pool.
///
/// Needed wherever several transactions must be in flight at once.
pub async fn setup_file_db(dir: &TempDir, max_connections: u32) -> SqlitePool {
    let path = dir.path().join("board.db");
    let config = PoolConfig {
        max_connections,
        min_connections: 1,
        acquire_timeout: Duration::from_secs(10),
        busy_timeout: Duration::from_secs(10),
    };
    let pool = create_pool(&database_url(path.to_str().expect("utf-8 temp path")), Some(config))
        .await
        .expect("failed to create file database");

    Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .expect("failed to run migrations");

    pool
}

/// Teardown test database
///
/// Closes the connection pool and cleans up resources.
pub async fn teardown_test_db(pool: SqlitePool) {
    pool.close().await;
}
