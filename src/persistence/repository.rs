//! Database Repository
//!
//! Data access layer for clients, credit transactions, and the daily
//! consumption log. `LedgerRepository` is the SQLite implementation of the
//! domain's `LedgerStore` boundary; the other repositories back the CRUD and
//! history surface.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::Row;
use tracing::{debug, error};
use uuid::Uuid;

use super::models::*;
use super::{DatabaseError, DbPool};
use crate::domain::errors::LedgerError;
use crate::domain::repositories::ledger_store::{
    BillableClient, ConsumptionEntry, LedgerResult, LedgerStore,
};
use crate::domain::services::balance::DailyDebit;

/// Client repository
pub struct ClientRepository {
    pool: DbPool,
}

impl ClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new client
    pub async fn create(&self, client: CreateClient) -> Result<ClientRecord, DatabaseError> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let record = sqlx::query_as::<_, ClientRecord>(
            r#"
            INSERT INTO clients (
                id, manager_id, name, phone, payment_method, payment_frequency,
                daily_budget, current_balance, alert_threshold, is_active,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&client.manager_id)
        .bind(&client.name)
        .bind(&client.phone)
        .bind(&client.payment_method)
        .bind(&client.payment_frequency)
        .bind(client.daily_budget)
        .bind(client.current_balance)
        .bind(client.alert_threshold)
        .bind(client.is_active)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create client: {}", e);
            DatabaseError::QueryError(format!("Failed to create client: {}", e))
        })?;

        debug!("Created client: {} ({})", record.id, record.name);
        Ok(record)
    }

    /// Get client by ID
    pub async fn get(&self, id: &str) -> Result<Option<ClientRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, ClientRecord>("SELECT * FROM clients WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get client {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to get client: {}", e))
            })?;

        Ok(record)
    }

    /// Update a client from a full form submit.
    ///
    /// `current_balance` is written as given: this is the manual-override
    /// path and no transaction row is emitted for it.
    pub async fn update(&self, id: &str, update: UpdateClient) -> Result<ClientRecord, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, ClientRecord>(
            r#"
            UPDATE clients
            SET name = ?1, phone = ?2, payment_method = ?3, payment_frequency = ?4,
                daily_budget = ?5, current_balance = ?6, alert_threshold = ?7,
                is_active = ?8, updated_at = ?9
            WHERE id = ?10
            RETURNING *
            "#,
        )
        .bind(&update.name)
        .bind(&update.phone)
        .bind(&update.payment_method)
        .bind(&update.payment_frequency)
        .bind(update.daily_budget)
        .bind(update.current_balance)
        .bind(update.alert_threshold)
        .bind(update.is_active)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to update client {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to update client: {}", e))
        })?
        .ok_or_else(|| DatabaseError::QueryError(format!("Client not found: {}", id)))?;

        debug!("Updated client: {}", id);
        Ok(record)
    }

    /// Delete a client. History rows go with it (FK cascade).
    pub async fn delete(&self, id: &str) -> Result<(), DatabaseError> {
        let rows_affected = sqlx::query("DELETE FROM clients WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to delete client {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to delete client: {}", e))
            })?
            .rows_affected();

        if rows_affected == 0 {
            return Err(DatabaseError::QueryError(format!(
                "Client not found: {}",
                id
            )));
        }

        debug!("Deleted client: {}", id);
        Ok(())
    }

    /// Get all clients, newest first
    pub async fn list(&self) -> Result<Vec<ClientRecord>, DatabaseError> {
        let records =
            sqlx::query_as::<_, ClientRecord>("SELECT * FROM clients ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to list clients: {}", e);
                    DatabaseError::QueryError(format!("Failed to list clients: {}", e))
                })?;

        Ok(records)
    }

    /// Dashboard aggregates over the roster
    pub async fn stats(&self) -> Result<ClientStats, DatabaseError> {
        let stats = sqlx::query_as::<_, ClientStats>(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) AS active,
                   COALESCE(SUM(CASE WHEN current_balance < alert_threshold THEN 1 ELSE 0 END), 0) AS low_balance,
                   COALESCE(SUM(current_balance), 0.0) AS total_balance
            FROM clients
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to compute client stats: {}", e);
            DatabaseError::QueryError(format!("Failed to compute client stats: {}", e))
        })?;

        Ok(stats)
    }
}

/// Credit transaction repository (read side; writes go through the ledger)
pub struct TransactionRepository {
    pool: DbPool,
}

impl TransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Recent transactions for a client, display ordering
    pub async fn recent_for_client(
        &self,
        client_id: &str,
        limit: i64,
    ) -> Result<Vec<CreditTransactionRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, CreditTransactionRecord>(
            r#"
            SELECT * FROM credit_transactions
            WHERE client_id = ?1
            ORDER BY transaction_date DESC, created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(client_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get transactions for {}: {}", client_id, e);
            DatabaseError::QueryError(format!("Failed to get transactions: {}", e))
        })?;

        Ok(records)
    }

    /// Signed sum of a client's transaction history: credits count positive,
    /// daily consumption negative. Equals the current balance for accounts
    /// whose balance was never manually overridden.
    pub async fn signed_sum(&self, client_id: &str) -> Result<f64, DatabaseError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(CASE WHEN transaction_type = 'credit_added' THEN amount ELSE -amount END), 0.0) AS signed_sum
            FROM credit_transactions
            WHERE client_id = ?1
            "#,
        )
        .bind(client_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to sum transactions for {}: {}", client_id, e);
            DatabaseError::QueryError(format!("Failed to sum transactions: {}", e))
        })?;

        let signed_sum: f64 = row.get("signed_sum");
        Ok(signed_sum)
    }
}

/// Daily consumption log repository (read side)
pub struct ConsumptionLogRepository {
    pool: DbPool,
}

impl ConsumptionLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Recent consumption log rows for a client
    pub async fn recent_for_client(
        &self,
        client_id: &str,
        limit: i64,
    ) -> Result<Vec<ConsumptionLogRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, ConsumptionLogRecord>(
            r#"
            SELECT * FROM daily_consumption_log
            WHERE client_id = ?1
            ORDER BY consumption_date DESC
            LIMIT ?2
            "#,
        )
        .bind(client_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get consumption log for {}: {}", client_id, e);
            DatabaseError::QueryError(format!("Failed to get consumption log: {}", e))
        })?;

        Ok(records)
    }
}

/// SQLite implementation of the domain `LedgerStore`.
///
/// Both write paths run inside a single transaction so the balance, the
/// audit transaction, and (for the daily path) the consumption log commit or
/// roll back together.
#[derive(Clone)]
pub struct LedgerRepository {
    pool: DbPool,
}

impl LedgerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn ledger_error(context: &str, e: sqlx::Error) -> LedgerError {
    let unique_violation = e
        .as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false);
    if unique_violation {
        LedgerError::WriteConflict(format!("{}: {}", context, e))
    } else {
        error!("{}: {}", context, e);
        LedgerError::Store(format!("{}: {}", context, e))
    }
}

#[async_trait]
impl LedgerStore for LedgerRepository {
    async fn billable_clients(&self) -> LedgerResult<Vec<BillableClient>> {
        let rows = sqlx::query_as::<_, (String, String, f64, f64)>(
            r#"
            SELECT id, name, daily_budget, current_balance
            FROM clients
            WHERE is_active = 1 AND daily_budget > 0
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ledger_error("Failed to select billable clients", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, daily_budget, current_balance)| BillableClient {
                id,
                name,
                daily_budget,
                current_balance,
            })
            .collect())
    }

    async fn consumption_log(
        &self,
        client_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Option<ConsumptionEntry>> {
        let row = sqlx::query_as::<_, (String, NaiveDate, f64, f64, f64)>(
            r#"
            SELECT client_id, consumption_date, amount, balance_before, balance_after
            FROM daily_consumption_log
            WHERE client_id = ?1 AND consumption_date = ?2
            "#,
        )
        .bind(client_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ledger_error("Failed to look up consumption log", e))?;

        Ok(row.map(
            |(client_id, consumption_date, amount, balance_before, balance_after)| {
                ConsumptionEntry {
                    client_id,
                    consumption_date,
                    amount,
                    balance_before,
                    balance_after,
                }
            },
        ))
    }

    async fn apply_daily_consumption(
        &self,
        client: &BillableClient,
        date: NaiveDate,
        debit: &DailyDebit,
    ) -> LedgerResult<()> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ledger_error("Failed to begin transaction", e))?;

        // The UNIQUE (client_id, consumption_date) index turns a racing
        // double-insert into a WriteConflict here, aborting the whole triple.
        sqlx::query(
            r#"
            INSERT INTO daily_consumption_log (
                id, client_id, consumption_date, amount,
                balance_before, balance_after, processed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&client.id)
        .bind(date)
        .bind(debit.amount)
        .bind(debit.balance_before)
        .bind(debit.balance_after)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| ledger_error("Failed to insert consumption log", e))?;

        sqlx::query(
            r#"
            INSERT INTO credit_transactions (
                id, client_id, transaction_type, amount, balance_after,
                description, transaction_date, created_at, created_by
            )
            VALUES (?1, ?2, 'daily_consumption', ?3, ?4, ?5, ?6, ?7, NULL)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&client.id)
        .bind(debit.amount)
        .bind(debit.balance_after)
        .bind(crate::domain::repositories::ledger_store::CONSUMPTION_DESCRIPTION)
        .bind(date)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| ledger_error("Failed to insert consumption transaction", e))?;

        // Conditioned on the balance this batch run read: if a concurrent
        // credit moved it, nothing matches and the triple rolls back.
        let rows_affected = sqlx::query(
            r#"
            UPDATE clients
            SET current_balance = ?1, updated_at = ?2
            WHERE id = ?3 AND current_balance = ?4
            "#,
        )
        .bind(debit.balance_after)
        .bind(now)
        .bind(&client.id)
        .bind(debit.balance_before)
        .execute(&mut *tx)
        .await
        .map_err(|e| ledger_error("Failed to update client balance", e))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(LedgerError::WriteConflict(format!(
                "balance of client {} changed concurrently",
                client.id
            )));
        }

        tx.commit()
            .await
            .map_err(|e| ledger_error("Failed to commit daily consumption", e))?;

        debug!(
            "Applied daily consumption for {}: {} -> {}",
            client.id, debit.balance_before, debit.balance_after
        );
        Ok(())
    }

    async fn apply_credit(
        &self,
        client_id: &str,
        amount: f64,
        description: &str,
        transaction_date: NaiveDate,
        created_by: &str,
    ) -> LedgerResult<f64> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ledger_error("Failed to begin transaction", e))?;

        // In-place increment: two concurrent credits both land, neither can
        // overwrite the other's read.
        let new_balance = sqlx::query_as::<_, (f64,)>(
            r#"
            UPDATE clients
            SET current_balance = current_balance + ?1, updated_at = ?2
            WHERE id = ?3
            RETURNING current_balance
            "#,
        )
        .bind(amount)
        .bind(now)
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ledger_error("Failed to credit client balance", e))?
        .ok_or_else(|| LedgerError::ClientNotFound(client_id.to_string()))?
        .0;

        sqlx::query(
            r#"
            INSERT INTO credit_transactions (
                id, client_id, transaction_type, amount, balance_after,
                description, transaction_date, created_at, created_by
            )
            VALUES (?1, ?2, 'credit_added', ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(client_id)
        .bind(amount)
        .bind(new_balance)
        .bind(description)
        .bind(transaction_date)
        .bind(now)
        .bind(created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| ledger_error("Failed to insert credit transaction", e))?;

        tx.commit()
            .await
            .map_err(|e| ledger_error("Failed to commit credit", e))?;

        debug!("Applied credit of {} to {}", amount, client_id);
        Ok(new_balance)
    }
}
