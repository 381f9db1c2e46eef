//! Migration framework
//!
//! Provides:
//! - A runner that verifies the on-disk ledger against the known migration
//!   set (names in order, script checksums) and applies the pending suffix,
//!   one transaction per migration
//! - Embedded SQL migrations compiled into the crate
//! - Loading migrations from a directory of `.sql` files

mod embedded;
mod runner;
mod source;

pub use embedded::embedded_migrations;
pub use runner::{
    applied_migrations, checksum, ensure_ledger, AppliedMigration, MigrationReport,
    MigrationRunner,
};
pub use source::load_migrations_from_dir;

/// A named schema change script
///
/// Names are globally unique and sort chronologically; the sort order is the
/// application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}
