//! Persistence Layer
//!
//! This module provides database persistence for clients, credit
//! transactions, and the daily consumption log. Uses SQLite for local
//! storage with async operations via sqlx.
//!
//! # Database Schema
//!
//! ## Clients Table
//! - id: UUID
//! - manager_id: Owning manager reference
//! - name: Display name
//! - phone: Optional contact phone
//! - payment_method: "pix" or "boleto"
//! - payment_frequency: "weekly", "biweekly" or "monthly"
//! - daily_budget: Decimal, debited at most once per day
//! - current_balance: Decimal, never negative
//! - alert_threshold: Decimal, low-balance warning level
//! - is_active: Inactive clients are exempt from the daily batch
//!
//! ## Credit Transactions Table
//! Append-only audit trail of every balance-affecting event. The sign of a
//! row is implied by its type: credit_added adds, daily_consumption
//! subtracts.
//!
//! ## Daily Consumption Log Table
//! One row per (client, calendar date) at most, enforced by a UNIQUE
//! constraint. A row's existence means that day's debit has been applied;
//! this constraint is what makes re-running the batch safe.

pub mod models;
pub mod repository;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

/// Initialize the database connection pool
///
/// # Arguments
/// - `database_url`: Path to SQLite database file (e.g., "sqlite://data/verba.db")
///
/// # Returns
/// Database connection pool ready for use
///
/// # Errors
/// Returns error if database connection fails or migrations fail
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    // Bounded timeouts: a contended write surfaces as an error instead of a
    // hang, and the batch reports it per client.
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(tracing::log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            manager_id TEXT NOT NULL,
            name TEXT NOT NULL,
            phone TEXT,
            payment_method TEXT NOT NULL DEFAULT 'pix' CHECK(payment_method IN ('pix', 'boleto')),
            payment_frequency TEXT NOT NULL DEFAULT 'monthly' CHECK(payment_frequency IN ('weekly', 'biweekly', 'monthly')),
            daily_budget REAL NOT NULL DEFAULT 0 CHECK(daily_budget >= 0),
            current_balance REAL NOT NULL DEFAULT 0 CHECK(current_balance >= 0),
            alert_threshold REAL NOT NULL DEFAULT 100,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create clients table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS credit_transactions (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL,
            transaction_type TEXT NOT NULL CHECK(transaction_type IN ('credit_added', 'daily_consumption')),
            amount REAL NOT NULL CHECK(amount >= 0),
            balance_after REAL NOT NULL,
            description TEXT,
            transaction_date DATE NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            created_by TEXT,
            FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create credit_transactions table: {}", e))
    })?;

    // UNIQUE (client_id, consumption_date) encodes the idempotency contract:
    // the application-level check-then-insert is not atomic, so a racing
    // batch run must lose here instead of double-charging.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_consumption_log (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL,
            consumption_date DATE NOT NULL,
            amount REAL NOT NULL CHECK(amount >= 0),
            balance_before REAL NOT NULL,
            balance_after REAL NOT NULL,
            processed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE,
            UNIQUE (client_id, consumption_date)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!(
            "Failed to create daily_consumption_log table: {}",
            e
        ))
    })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_clients_active ON clients(is_active)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_client_date ON credit_transactions(client_id, transaction_date)",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_consumption_date ON daily_consumption_log(consumption_date)",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/verba.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Enable query logging
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/verba.db".to_string(),
            max_connections: 5,
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/verba.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let log_queries = std::env::var("DATABASE_LOG_QUERIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(cfg!(debug_assertions));

        Self {
            url,
            max_connections,
            log_queries,
        }
    }
}
