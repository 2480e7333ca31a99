//! Ledger Store Trait
//!
//! This module defines the `LedgerStore` trait, the storage boundary the
//! ledger core depends on. The daily consumption processor and the credit
//! poster only see this interface, which keeps them testable against mock
//! stores (including stores that fail for specific clients).

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::errors::LedgerError;
use crate::domain::services::balance::DailyDebit;

/// Common result type for store operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Description recorded on automated daily consumption transactions.
pub const CONSUMPTION_DESCRIPTION: &str = "Consumo diário automático";

/// Projection of a client the daily batch operates on.
#[derive(Debug, Clone)]
pub struct BillableClient {
    pub id: String,
    pub name: String,
    pub daily_budget: f64,
    pub current_balance: f64,
}

/// One applied daily debit, as witnessed by the consumption log.
#[derive(Debug, Clone)]
pub struct ConsumptionEntry {
    pub client_id: String,
    pub consumption_date: NaiveDate,
    pub amount: f64,
    pub balance_before: f64,
    pub balance_after: f64,
}

/// Storage operations the ledger core consumes.
///
/// Implementations must guarantee that the multi-row writes behave
/// atomically: either every row of an operation is visible to subsequent
/// readers or none is.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Clients eligible for the daily batch: active with a positive budget.
    async fn billable_clients(&self) -> LedgerResult<Vec<BillableClient>>;

    /// The consumption log row for (client, date), if that day was already
    /// debited. This is the idempotency guard's lookup.
    async fn consumption_log(
        &self,
        client_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Option<ConsumptionEntry>>;

    /// Atomically persist one day's debit: update the client balance, insert
    /// the consumption log row, insert the audit transaction.
    ///
    /// Losing a race on the (client, date) uniqueness constraint or on a
    /// concurrent balance change returns [`LedgerError::WriteConflict`] with
    /// no partial write.
    async fn apply_daily_consumption(
        &self,
        client: &BillableClient,
        date: NaiveDate,
        debit: &DailyDebit,
    ) -> LedgerResult<()>;

    /// Atomically record a manual credit: increment the client balance and
    /// insert the audit transaction. Returns the new balance.
    async fn apply_credit(
        &self,
        client_id: &str,
        amount: f64,
        description: &str,
        transaction_date: NaiveDate,
        created_by: &str,
    ) -> LedgerResult<f64>;
}
