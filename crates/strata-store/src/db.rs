//! Database connection management
//!
//! Opens SQLite files with the durability settings from [`StoreConfig`] and
//! wraps a connection for sharing between threads.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;
use strata_core::errors::StrataError;

use crate::config::StoreConfig;
use crate::errors::{from_rusqlite, Result};

/// Open a SQLite file at the given path and configure it
pub fn open_connection<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| from_rusqlite("open", e))?;
    configure(&conn, config)?;
    Ok(conn)
}

/// Apply journal, sync, foreign key and busy timeout settings
pub fn configure(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = {};
         PRAGMA synchronous = {};
         PRAGMA foreign_keys = ON;",
        config.journal_mode.pragma_value(),
        config.sync_mode.pragma_value(),
    ))
    .map_err(|e| from_rusqlite("configure", e))?;

    conn.busy_timeout(config.busy_timeout())
        .map_err(|e| from_rusqlite("configure", e))?;

    Ok(())
}

/// A connection shared by every store handed out for one tenant
///
/// Calls are serialized on an internal mutex. After [`Database::close`] the
/// connection is gone and every further call fails with a storage error,
/// including calls through store handles cloned before the close.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl Database {
    /// Open and configure the file at `path`
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_connection(&path, config)?;
        Ok(Self::from_connection(path, conn))
    }

    /// Wrap an already-configured connection
    pub fn from_connection(path: impl Into<PathBuf>, conn: Connection) -> Self {
        Self {
            path: path.into(),
            conn: Mutex::new(Some(conn)),
        }
    }

    /// Open a private in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| from_rusqlite("open", e))?;
        Ok(Self::from_connection(":memory:", conn))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<T, F>(&self, op: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut guard = self.conn.lock().map_err(|_| StrataError::Storage {
            op: op.to_string(),
            message: "connection lock poisoned".to_string(),
        })?;
        let conn = guard.as_mut().ok_or_else(|| StrataError::Storage {
            op: op.to_string(),
            message: format!("connection to {} is closed", self.path.display()),
        })?;
        f(conn)
    }

    /// Close the connection; closing twice is a no-op
    pub fn close(&self) -> Result<()> {
        let conn = match self.conn.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match conn {
            Some(conn) => conn.close().map_err(|(_, e)| from_rusqlite("close", e)),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.conn.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }
}
