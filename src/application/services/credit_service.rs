//! Credit Poster
//!
//! Records a manual balance top-up for a single client. Unlike the daily
//! batch this is caller-synchronous and intentionally non-idempotent: every
//! accepted invocation adds a new credit, and duplicate-submission guarding
//! belongs to the caller.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::domain::repositories::ledger_store::{LedgerResult, LedgerStore};
use crate::domain::services::balance;

/// Description recorded when the caller does not provide one.
pub const DEFAULT_CREDIT_DESCRIPTION: &str = "Crédito adicionado manualmente";

pub struct CreditService {
    store: Arc<dyn LedgerStore>,
}

impl CreditService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Post a credit and return the client's new balance.
    ///
    /// The amount is validated before any write. `transaction_date` may be
    /// backdated; it defaults to today (UTC).
    pub async fn post_credit(
        &self,
        client_id: &str,
        amount: f64,
        description: Option<String>,
        transaction_date: Option<NaiveDate>,
        created_by: &str,
    ) -> LedgerResult<f64> {
        balance::validate_credit(amount)?;

        let transaction_date = transaction_date.unwrap_or_else(|| Utc::now().date_naive());
        let description =
            description.unwrap_or_else(|| DEFAULT_CREDIT_DESCRIPTION.to_string());

        let new_balance = self
            .store
            .apply_credit(client_id, amount, &description, transaction_date, created_by)
            .await?;

        info!(
            "Crédito de {:.2} registrado para cliente {} (novo saldo {:.2})",
            amount, client_id, new_balance
        );
        Ok(new_balance)
    }
}
