//! Loading migrations from disk

use std::fs;
use std::path::Path;

use super::Migration;
use crate::errors::{io_error, Result};

const SCRIPT_EXTENSION: &str = "sql";

/// Load every `*.sql` file in `dir` as a migration named after its file stem
///
/// Subdirectories and other files are ignored. The result is sorted by name.
pub fn load_migrations_from_dir(dir: impl AsRef<Path>) -> Result<Vec<Migration>> {
    let entries = fs::read_dir(dir.as_ref()).map_err(|e| io_error("read_migration_dir", e))?;

    let mut migrations = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| io_error("read_migration_dir", e))?
            .path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let sql = fs::read_to_string(&path).map_err(|e| io_error("read_migration", e))?;
        migrations.push(Migration::new(name, sql));
    }

    migrations.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(count = migrations.len(), "loaded migrations from directory");
    Ok(migrations)
}
