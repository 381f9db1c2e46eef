//! Atomic publish of tenant files
//!
//! A tenant file is built under a staging name and renamed into place, so a
//! canonical path never names a half-migrated database.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{io_error, Result};

const STAGING_SUFFIX: &str = ".tmp";
const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// Staging path for `target`: the same name with `.tmp` appended
pub fn staging_path(target: &Path) -> PathBuf {
    with_suffix(target, STAGING_SUFFIX)
}

/// Rename a fully written `temp` file over `target`
pub fn publish(temp: &Path, target: &Path) -> Result<()> {
    fs::rename(temp, target).map_err(|e| io_error("publish_tenant", e))?;
    tracing::debug!(target = %target.display(), "published tenant file");
    Ok(())
}

/// Remove a database file and its WAL sidecars; missing files are ignored
pub fn discard(path: &Path) -> Result<()> {
    remove_if_exists(path)?;
    for suffix in SIDECAR_SUFFIXES {
        remove_if_exists(&with_suffix(path, suffix))?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error("remove_tenant_file", e)),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
