//! Daily Consumption Processor
//!
//! Debits every active client with a positive budget exactly once per
//! calendar day. Safe to invoke repeatedly: the consumption log is the
//! idempotency witness, and a client already logged for the date is skipped.
//! One client's failure never blocks the rest of the batch.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::domain::errors::LedgerError;
use crate::domain::repositories::ledger_store::{BillableClient, LedgerResult, LedgerStore};
use crate::domain::services::balance;

/// Aggregated outcome of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConsumptionSummary {
    pub processed: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
}

enum ClientOutcome {
    Processed,
    Skipped,
}

pub struct DailyConsumptionProcessor {
    store: Arc<dyn LedgerStore>,
}

impl DailyConsumptionProcessor {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Run the batch for the given calendar date.
    ///
    /// The date is an explicit parameter so callers fix the daily cycle
    /// (UTC at the HTTP boundary) and tests inject deterministic dates.
    /// Only the initial candidate selection can fail the call as a whole;
    /// per-client failures are collected into the summary.
    pub async fn process(&self, date: NaiveDate) -> LedgerResult<ConsumptionSummary> {
        let clients = self.store.billable_clients().await?;
        info!(
            "Consumo diário {}: {} clientes elegíveis",
            date,
            clients.len()
        );

        let mut summary = ConsumptionSummary::default();
        for client in &clients {
            match self.process_client(client, date).await {
                Ok(ClientOutcome::Processed) => summary.processed += 1,
                Ok(ClientOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    error!("Daily consumption failed for client {}: {}", client.id, e);
                    summary.errors.push(format!("Client {}: {}", client.id, e));
                }
            }
        }

        info!(
            "Consumo diário {} concluído: {} processados, {} ignorados, {} erros",
            date,
            summary.processed,
            summary.skipped,
            summary.errors.len()
        );
        Ok(summary)
    }

    async fn process_client(
        &self,
        client: &BillableClient,
        date: NaiveDate,
    ) -> LedgerResult<ClientOutcome> {
        if self.store.consumption_log(&client.id, date).await?.is_some() {
            return Ok(ClientOutcome::Skipped);
        }

        let debit = balance::apply_daily_budget(client.current_balance, client.daily_budget);

        match self.store.apply_daily_consumption(client, date, &debit).await {
            Ok(()) => Ok(ClientOutcome::Processed),
            // Lost the race against a concurrent run for the same date.
            Err(LedgerError::WriteConflict(reason)) => {
                warn!("Client {} already debited for {}: {}", client.id, date, reason);
                Ok(ClientOutcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::ledger_store::ConsumptionEntry;
    use crate::domain::services::balance::DailyDebit;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::Mutex;

    /// In-memory store for exercising the batch loop, with per-client fault
    /// injection.
    struct MockLedgerStore {
        clients: Vec<BillableClient>,
        logs: Mutex<HashMap<(String, NaiveDate), ConsumptionEntry>>,
        balances: Mutex<HashMap<String, f64>>,
        fail_clients: HashSet<String>,
        fail_selection: bool,
        conflict_clients: HashSet<String>,
    }

    impl MockLedgerStore {
        fn new(clients: Vec<(&str, f64, f64)>) -> Self {
            let balances = clients
                .iter()
                .map(|(id, _, balance)| (id.to_string(), *balance))
                .collect();
            let clients = clients
                .into_iter()
                .map(|(id, daily_budget, current_balance)| BillableClient {
                    id: id.to_string(),
                    name: format!("Cliente {}", id),
                    daily_budget,
                    current_balance,
                })
                .collect();
            Self {
                clients,
                logs: Mutex::new(HashMap::new()),
                balances: Mutex::new(balances),
                fail_clients: HashSet::new(),
                fail_selection: false,
                conflict_clients: HashSet::new(),
            }
        }

        fn failing_for(mut self, client_id: &str) -> Self {
            self.fail_clients.insert(client_id.to_string());
            self
        }

        fn conflicting_for(mut self, client_id: &str) -> Self {
            self.conflict_clients.insert(client_id.to_string());
            self
        }

        async fn balance_of(&self, client_id: &str) -> f64 {
            *self.balances.lock().await.get(client_id).unwrap()
        }

        async fn log_count(&self) -> usize {
            self.logs.lock().await.len()
        }
    }

    #[async_trait]
    impl LedgerStore for MockLedgerStore {
        async fn billable_clients(&self) -> LedgerResult<Vec<BillableClient>> {
            if self.fail_selection {
                return Err(LedgerError::Store("connection refused".to_string()));
            }
            let balances = self.balances.lock().await;
            Ok(self
                .clients
                .iter()
                .map(|c| BillableClient {
                    current_balance: *balances.get(&c.id).unwrap_or(&c.current_balance),
                    ..c.clone()
                })
                .collect())
        }

        async fn consumption_log(
            &self,
            client_id: &str,
            date: NaiveDate,
        ) -> LedgerResult<Option<ConsumptionEntry>> {
            let logs = self.logs.lock().await;
            Ok(logs.get(&(client_id.to_string(), date)).cloned())
        }

        async fn apply_daily_consumption(
            &self,
            client: &BillableClient,
            date: NaiveDate,
            debit: &DailyDebit,
        ) -> LedgerResult<()> {
            if self.fail_clients.contains(&client.id) {
                return Err(LedgerError::Store("disk I/O error".to_string()));
            }
            if self.conflict_clients.contains(&client.id) {
                return Err(LedgerError::WriteConflict(
                    "UNIQUE constraint failed".to_string(),
                ));
            }
            let mut logs = self.logs.lock().await;
            let key = (client.id.clone(), date);
            if logs.contains_key(&key) {
                return Err(LedgerError::WriteConflict(
                    "UNIQUE constraint failed".to_string(),
                ));
            }
            logs.insert(
                key,
                ConsumptionEntry {
                    client_id: client.id.clone(),
                    consumption_date: date,
                    amount: debit.amount,
                    balance_before: debit.balance_before,
                    balance_after: debit.balance_after,
                },
            );
            self.balances
                .lock()
                .await
                .insert(client.id.clone(), debit.balance_after);
            Ok(())
        }

        async fn apply_credit(
            &self,
            client_id: &str,
            amount: f64,
            _description: &str,
            _transaction_date: NaiveDate,
            _created_by: &str,
        ) -> LedgerResult<f64> {
            let mut balances = self.balances.lock().await;
            let balance = balances
                .get_mut(client_id)
                .ok_or_else(|| LedgerError::ClientNotFound(client_id.to_string()))?;
            *balance = balance::apply_credit(*balance, amount)?;
            Ok(*balance)
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_process_debits_each_client_once() {
        let store = Arc::new(MockLedgerStore::new(vec![
            ("c1", 30.0, 50.0),
            ("c2", 30.0, 10.0),
        ]));
        let processor = DailyConsumptionProcessor::new(store.clone());

        let summary = processor.process(date("2024-06-01")).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 0);
        assert!(summary.errors.is_empty());

        assert_eq!(store.balance_of("c1").await, 20.0);
        assert_eq!(store.balance_of("c2").await, 0.0);
    }

    #[tokio::test]
    async fn test_process_twice_same_day_is_noop() {
        let store = Arc::new(MockLedgerStore::new(vec![("c1", 30.0, 50.0)]));
        let processor = DailyConsumptionProcessor::new(store.clone());

        processor.process(date("2024-06-01")).await.unwrap();
        let second = processor.process(date("2024-06-01")).await.unwrap();

        assert_eq!(second.processed, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(store.balance_of("c1").await, 20.0);
        assert_eq!(store.log_count().await, 1);
    }

    #[tokio::test]
    async fn test_next_day_processes_independently() {
        let store = Arc::new(MockLedgerStore::new(vec![("c1", 30.0, 50.0)]));
        let processor = DailyConsumptionProcessor::new(store.clone());

        processor.process(date("2024-06-01")).await.unwrap();
        let next = processor.process(date("2024-06-02")).await.unwrap();

        assert_eq!(next.processed, 1);
        assert_eq!(store.balance_of("c1").await, 0.0);
        assert_eq!(store.log_count().await, 2);
    }

    #[tokio::test]
    async fn test_zero_balance_still_marks_day_processed() {
        let store = Arc::new(MockLedgerStore::new(vec![("c1", 30.0, 0.0)]));
        let processor = DailyConsumptionProcessor::new(store.clone());

        let summary = processor.process(date("2024-06-01")).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(store.balance_of("c1").await, 0.0);

        let logs = store.logs.lock().await;
        let entry = logs
            .get(&("c1".to_string(), date("2024-06-01")))
            .expect("day must be logged");
        assert_eq!(entry.amount, 0.0);
    }

    #[tokio::test]
    async fn test_one_failing_client_does_not_block_batch() {
        let store = Arc::new(
            MockLedgerStore::new(vec![
                ("c1", 30.0, 100.0),
                ("c2", 30.0, 100.0),
                ("c3", 30.0, 100.0),
                ("c4", 30.0, 100.0),
                ("c5", 30.0, 100.0),
            ])
            .failing_for("c3"),
        );
        let processor = DailyConsumptionProcessor::new(store.clone());

        let summary = processor.process(date("2024-06-01")).await.unwrap();
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("c3"));

        // The failing client keeps its balance and has no log row.
        assert_eq!(store.balance_of("c3").await, 100.0);
        assert_eq!(store.log_count().await, 4);
    }

    #[tokio::test]
    async fn test_write_conflict_counts_as_skip() {
        let store = Arc::new(
            MockLedgerStore::new(vec![("c1", 30.0, 100.0), ("c2", 30.0, 100.0)])
                .conflicting_for("c1"),
        );
        let processor = DailyConsumptionProcessor::new(store.clone());

        let summary = processor.process(date("2024-06-01")).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_selection_failure_fails_batch() {
        let mut store = MockLedgerStore::new(vec![("c1", 30.0, 100.0)]);
        store.fail_selection = true;
        let processor = DailyConsumptionProcessor::new(Arc::new(store));

        let result = processor.process(date("2024-06-01")).await;
        assert!(matches!(result, Err(LedgerError::Store(_))));
    }
}
