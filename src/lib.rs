//! Verba — prepaid advertising budget ledger
//!
//! This library provides the core components for managing client budgets:
//! the append-only credit ledger, the idempotent daily consumption batch,
//! and the HTTP boundary the dashboard consumes.

pub mod application;
pub mod config;
pub mod domain;
pub mod persistence;
pub mod rate_limit;
