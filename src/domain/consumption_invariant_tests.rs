//! Invariant checks linking the balance mutator to the ledger contract:
//! whatever the inputs, a daily debit never drives a balance negative and
//! never debits more than the balance held.

use crate::domain::services::balance::{apply_credit, apply_daily_budget};

#[test]
fn test_daily_debit_invariants_across_range() {
    let balances = [0.0, 0.01, 5.0, 10.0, 29.99, 30.0, 30.01, 100.0, 12345.67];
    let budgets = [0.0, 0.01, 10.0, 30.0, 99.99, 500.0];

    for &balance in &balances {
        for &budget in &budgets {
            let debit = apply_daily_budget(balance, budget);

            assert!(debit.balance_after >= 0.0, "balance went negative");
            assert!(
                debit.amount <= debit.balance_before,
                "debited more than held: {} > {}",
                debit.amount,
                debit.balance_before
            );
            assert!(
                (debit.balance_before - debit.amount - debit.balance_after).abs() < 1e-9,
                "debit does not reconcile: {} - {} != {}",
                debit.balance_before,
                debit.amount,
                debit.balance_after
            );
        }
    }
}

#[test]
fn test_credit_then_debit_reconciles() {
    let balance = apply_credit(0.0, 100.0).unwrap();
    let debit = apply_daily_budget(balance, 30.0);

    // Signed ledger sum equals the resulting balance.
    let ledger_sum = 100.0 - debit.amount;
    assert_eq!(ledger_sum, debit.balance_after);
}

#[test]
fn test_repeated_debits_drain_to_zero() {
    let mut balance = 70.0;
    let mut total_debited = 0.0;

    for _ in 0..5 {
        let debit = apply_daily_budget(balance, 30.0);
        total_debited += debit.amount;
        balance = debit.balance_after;
    }

    assert_eq!(balance, 0.0);
    assert_eq!(total_debited, 70.0);
}
