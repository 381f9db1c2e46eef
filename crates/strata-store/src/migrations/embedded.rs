//! Embedded SQL migrations
//!
//! Migrations are embedded at compile time using include_str!

use super::Migration;

/// Get all embedded migrations in application order
pub fn embedded_migrations() -> Vec<Migration> {
    vec![Migration::new(
        "20250601_01_event_tables",
        include_str!("../../migrations/20250601_01_event_tables.sql"),
    )]
}
