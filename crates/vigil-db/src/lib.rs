//! # vigil-db
//!
//! PostgreSQL database layer for vigil.
//!
//! This crate provides:
//! - Connection pool management
//! - Alert repository with guarded lifecycle transitions
//! - Operator token repository implementing bearer verification
//!
//! ## Example
//!
//! ```rust,ignore
//! use vigil_db::{Database, AlertRepository, CreateAlertRequest, AlertSeverity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/vigil").await?;
//!
//!     let alert = db.alerts.insert(organization_id, CreateAlertRequest {
//!         patient_id,
//!         rule_key: "spo2_low".to_string(),
//!         severity: AlertSeverity::Critical,
//!         title: "SpO2 below 90%".to_string(),
//!         detail: serde_json::json!({ "measured": 87 }),
//!     }).await?;
//!
//!     println!("Created alert: {}", alert.id);
//!     Ok(())
//! }
//! ```
pub mod alerts;
pub mod pool;
pub mod tokens;

// Test fixtures for integration tests
// Note: Always compiled so downstream crates' tests can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use vigil_core::*;

// Re-export repository implementations
pub use alerts::PgAlertRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tokens::PgTokenRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Alert repository for lifecycle operations.
    pub alerts: PgAlertRepository,
    /// Operator token repository for bearer verification.
    pub tokens: PgTokenRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            alerts: PgAlertRepository::new(pool.clone()),
            tokens: PgTokenRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Connect to test database (for integration tests).
    #[cfg(test)]
    pub async fn connect_test() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| crate::test_fixtures::DEFAULT_TEST_DATABASE_URL.to_string());
        Self::connect(&database_url).await
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_database_connect_and_clone() {
        let db = Database::connect_test().await.unwrap();
        let cloned = db.clone();
        assert_eq!(db.pool().size(), cloned.pool().size());
    }
}
