//! Database Models
//!
//! Persistent data structures for clients, credit transactions, and the
//! daily consumption log.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Client record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientRecord {
    pub id: String,
    pub manager_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub payment_method: String,    // "pix" or "boleto"
    pub payment_frequency: String, // "weekly", "biweekly" or "monthly"
    pub daily_budget: f64,
    pub current_balance: f64,
    pub alert_threshold: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Credit transaction record in database. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditTransactionRecord {
    pub id: String,
    pub client_id: String,
    pub transaction_type: String, // "credit_added" or "daily_consumption"
    pub amount: f64,
    pub balance_after: f64,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

/// Daily consumption log record in database. One per (client, date).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsumptionLogRecord {
    pub id: String,
    pub client_id: String,
    pub consumption_date: NaiveDate,
    pub amount: f64,
    pub balance_before: f64,
    pub balance_after: f64,
    pub processed_at: DateTime<Utc>,
}

/// Create client input
#[derive(Debug, Clone)]
pub struct CreateClient {
    pub manager_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub payment_method: String,
    pub payment_frequency: String,
    pub daily_budget: f64,
    pub current_balance: f64,
    pub alert_threshold: f64,
    pub is_active: bool,
}

/// Update client input (full form submit). Setting `current_balance` here is
/// the manual-override path: it does NOT emit a credit transaction.
#[derive(Debug, Clone)]
pub struct UpdateClient {
    pub name: String,
    pub phone: Option<String>,
    pub payment_method: String,
    pub payment_frequency: String,
    pub daily_budget: f64,
    pub current_balance: f64,
    pub alert_threshold: f64,
    pub is_active: bool,
}

/// Dashboard aggregates over the client roster.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClientStats {
    pub total: i64,
    pub active: i64,
    pub low_balance: i64,
    pub total_balance: f64,
}
