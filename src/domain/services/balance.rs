//! Balance mutation rules for the prepaid ledger.
//!
//! Pure computations, no I/O. The orchestrators (daily consumption
//! processor, credit poster) decide when to apply these and the store makes
//! the result durable.

use crate::domain::errors::LedgerError;

/// Outcome of applying one day's budget against a balance.
///
/// The debited amount is capped at the remaining balance: a client with less
/// balance than budget is drained to zero, and a client already at zero gets
/// a zero-amount debit that still marks the day as consumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyDebit {
    pub amount: f64,
    pub balance_before: f64,
    pub balance_after: f64,
}

/// Compute the daily debit for a client.
///
/// Invariants: `amount <= balance_before`, `balance_after >= 0`,
/// `balance_before - amount == balance_after`.
pub fn apply_daily_budget(current_balance: f64, daily_budget: f64) -> DailyDebit {
    let amount = daily_budget.min(current_balance);
    let balance_after = (current_balance - daily_budget).max(0.0);
    DailyDebit {
        amount,
        balance_before: current_balance,
        balance_after,
    }
}

/// Reject non-positive or malformed credit amounts before any write happens.
pub fn validate_credit(amount: f64) -> Result<(), LedgerError> {
    if !amount.is_finite() {
        return Err(LedgerError::InvalidAmount(format!(
            "credit amount must be a finite number, got {}",
            amount
        )));
    }
    if amount <= 0.0 {
        return Err(LedgerError::InvalidAmount(format!(
            "credit amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// Compute the balance after a manual credit.
pub fn apply_credit(current_balance: f64, amount: f64) -> Result<f64, LedgerError> {
    validate_credit(amount)?;
    Ok(current_balance + amount)
}
