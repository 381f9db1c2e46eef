//! Migration runner
//!
//! Verifies the ledger and applies pending migrations, one transaction each

use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use sha2::{Digest, Sha256};
use strata_core::errors::StrataError;
use strata_core::{log_op_end, log_op_error, log_op_start};

use super::{embedded_migrations, Migration};
use crate::errors::{from_rusqlite, invalid_input, migration_error, to_u64, Result};

/// One row of the migration ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub sequence: u64,
    pub name: String,
    /// SHA-256 of the script at the time it ran; absent for rows written by
    /// tools that do not record it
    pub checksum: Option<String>,
    pub applied_at: DateTime<Utc>,
}

/// Outcome of [`MigrationRunner::apply_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Names applied by this run, in order
    pub applied: Vec<String>,
    /// Ledger length found before this run
    pub already_applied: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies a fixed, name-ordered set of migrations to SQLite files
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

impl MigrationRunner {
    /// Sort `migrations` by name; duplicate names are rejected
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
        migrations.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = migrations.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(invalid_input(format!(
                "duplicate migration name '{}'",
                pair[0].name
            )));
        }
        Ok(Self { migrations })
    }

    /// Runner over the migrations compiled into this crate
    pub fn embedded() -> Self {
        let mut migrations = embedded_migrations();
        migrations.sort_by(|a, b| a.name.cmp(&b.name));
        Self { migrations }
    }

    /// Known migrations in application order
    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Bring `conn` up to date
    ///
    /// Fails with `SchemaDivergence` (and changes nothing) if the ledger does
    /// not match a prefix of the known migrations. Each pending migration is
    /// recorded and executed in its own IMMEDIATE transaction; a failing
    /// script rolls back its ledger row too, and earlier migrations stay
    /// applied.
    pub fn apply_all(&self, conn: &mut Connection) -> Result<MigrationReport> {
        log_op_start!("apply_migrations", known = self.migrations.len());
        let start = Instant::now();

        let report = self.apply_all_impl(conn).map_err(|e| {
            log_op_error!(
                "apply_migrations",
                e,
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "apply_migrations",
            duration_ms = start.elapsed().as_millis() as u64,
            applied_count = report.applied.len()
        );
        Ok(report)
    }

    fn apply_all_impl(&self, conn: &mut Connection) -> Result<MigrationReport> {
        ensure_ledger(conn)?;

        let mut report = MigrationReport::default();
        let mut first_pass = true;
        loop {
            // The ledger is re-read under the write lock so a concurrent
            // runner on the same file cannot make us apply a migration twice.
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| from_rusqlite("begin_migration", e))?;

            let ledger = read_ledger(&tx)?;
            let position = self.verify(&ledger)?;
            if first_pass {
                report.already_applied = position;
                first_pass = false;
            }

            let Some(migration) = self.migrations.get(position) else {
                break;
            };

            tracing::debug!(migration = %migration.name, position, "applying migration");
            tx.execute(
                "INSERT INTO migrations (name, checksum, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    migration.name,
                    checksum(&migration.sql),
                    Utc::now().timestamp_millis()
                ],
            )
            .map_err(|e| from_rusqlite("record_migration", e))?;
            tx.execute_batch(&migration.sql)
                .map_err(|e| migration_error(&migration.name, e))?;
            tx.commit().map_err(|e| from_rusqlite("commit_migration", e))?;

            report.applied.push(migration.name.clone());
        }

        Ok(report)
    }

    /// Walk the ledger against the known set; returns the next position to apply
    fn verify(&self, ledger: &[AppliedMigration]) -> Result<usize> {
        for (position, entry) in ledger.iter().enumerate() {
            let Some(known) = self.migrations.get(position) else {
                return Err(StrataError::SchemaDivergence {
                    position,
                    expected: "<none>".to_string(),
                    found: entry.name.clone(),
                });
            };
            if known.name != entry.name {
                return Err(StrataError::SchemaDivergence {
                    position,
                    expected: known.name.clone(),
                    found: entry.name.clone(),
                });
            }
            if let Some(recorded) = &entry.checksum {
                let current = checksum(&known.sql);
                if *recorded != current {
                    return Err(StrataError::ChecksumMismatch {
                        migration: known.name.clone(),
                        recorded: recorded.clone(),
                        known: current,
                    });
                }
            }
        }
        Ok(ledger.len())
    }
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Compute the SHA-256 hex digest of a migration script
pub fn checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create the ledger table if it doesn't exist
///
/// Ledger names are unique whichever migration set runs against the file.
pub fn ensure_ledger(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            sequence   INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT    NOT NULL UNIQUE,
            checksum   TEXT,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| from_rusqlite("ensure_ledger", e))?;

    Ok(())
}

/// List the ledger in application order
pub fn applied_migrations(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    read_ledger(conn)
}

fn read_ledger(conn: &Connection) -> Result<Vec<AppliedMigration>> {
    let mut stmt = conn
        .prepare("SELECT sequence, name, checksum, applied_at FROM migrations ORDER BY sequence")
        .map_err(|e| from_rusqlite("read_ledger", e))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .map_err(|e| from_rusqlite("read_ledger", e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| from_rusqlite("read_ledger", e))?;

    rows.into_iter()
        .map(|(sequence, name, checksum, applied_at)| {
            Ok(AppliedMigration {
                sequence: to_u64("read_ledger", sequence)?,
                name,
                checksum,
                applied_at: DateTime::from_timestamp_millis(applied_at).ok_or_else(|| {
                    StrataError::Storage {
                        op: "read_ledger".to_string(),
                        message: format!("invalid applied_at {}", applied_at),
                    }
                })?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(names: &[&str]) -> MigrationRunner {
        MigrationRunner::new(
            names
                .iter()
                .map(|n| Migration::new(*n, format!("CREATE TABLE t_{} (x);", n)))
                .collect(),
        )
        .unwrap()
    }

    fn entry(position: usize, name: &str, sql: Option<&str>) -> AppliedMigration {
        AppliedMigration {
            sequence: position as u64 + 1,
            name: name.to_string(),
            checksum: sql.map(checksum),
            applied_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_sorts_by_name() {
        let runner = runner(&["b", "a", "c"]);
        let names: Vec<_> = runner.migrations().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = MigrationRunner::new(vec![Migration::new("a", "x"), Migration::new("a", "y")])
            .unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_INPUT");
    }

    #[test]
    fn test_verify_prefix_returns_next_position() {
        let runner = runner(&["a", "b", "c"]);
        let ledger = vec![entry(0, "a", None), entry(1, "b", None)];
        assert_eq!(runner.verify(&ledger).unwrap(), 2);
    }

    #[test]
    fn test_verify_name_mismatch() {
        let runner = runner(&["a", "b"]);
        let ledger = vec![entry(0, "a", None), entry(1, "x", None)];
        let err = runner.verify(&ledger).unwrap_err();
        assert_eq!(
            err,
            StrataError::SchemaDivergence {
                position: 1,
                expected: "b".to_string(),
                found: "x".to_string(),
            }
        );
    }

    #[test]
    fn test_verify_ledger_longer_than_known() {
        let runner = runner(&["a"]);
        let ledger = vec![entry(0, "a", None), entry(1, "b", None)];
        assert!(matches!(
            runner.verify(&ledger),
            Err(StrataError::SchemaDivergence { position: 1, .. })
        ));
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let runner = runner(&["a"]);
        let ledger = vec![entry(0, "a", Some("CREATE TABLE other (y);"))];
        assert!(matches!(
            runner.verify(&ledger),
            Err(StrataError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        let digest = checksum("SELECT 1");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, checksum("SELECT 1"));
    }

    #[test]
    fn test_ledger_rejects_duplicate_names() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_ledger(&conn).unwrap();
        let insert = "INSERT INTO migrations (name, checksum, applied_at) VALUES ('a', NULL, 0)";
        conn.execute(insert, []).unwrap();

        let err = conn.execute(insert, []).unwrap_err();
        assert!(crate::errors::is_unique_violation(&err));
    }

    #[test]
    fn test_empty_set_on_empty_db_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = MigrationRunner::new(vec![]).unwrap().apply_all(&mut conn).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.already_applied, 0);
    }
}
