use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by ledger operations.
///
/// "Already processed" is deliberately absent: a duplicate daily debit is a
/// skip signal inside the batch loop, not an error. Races that lose against
/// another writer surface as [`LedgerError::WriteConflict`] and are mapped to
/// a skip by the daily path.
#[derive(Debug, Error, Serialize, Deserialize, Clone)]
#[serde(tag = "type", content = "message")]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<LedgerError> for String {
    fn from(error: LedgerError) -> Self {
        error.to_string()
    }
}
