//! Strata Store - per-tenant SQLite persistence for the event log
//!
//! Provides:
//! - Forward-only migration runner with a verified, checksummed ledger
//! - Event store: expected-version guarded appends and filtered ordered reads
//! - Snapshot store: monotonic-version upsert keyed by stream and schema version
//! - Tenant manager: one SQLite file per tenant, provisioned by
//!   migrate-then-rename and cached as a shared connection
//!
//! ## Logging Ownership
//!
//! Public operations log `start`/`end`/`end_error` through the strata-core
//! macros. Internal steps use `tracing::debug!` only.

pub mod config;
pub mod db;
pub mod errors;
pub mod event_store;
pub mod migrations;
mod query;
pub mod snapshot_store;
pub mod tenancy;

// Re-export key types
pub use config::{JournalMode, StoreConfig, SyncMode};
pub use db::Database;
pub use errors::Result;
pub use event_store::EventStore;
pub use migrations::{Migration, MigrationReport, MigrationRunner};
pub use snapshot_store::SnapshotStore;
pub use tenancy::{TenantManager, TenantStore};
