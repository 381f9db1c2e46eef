//! Snapshot persistence
//!
//! One row per `(stream_id, schema_version)`. A save only replaces the row
//! when its version is not older than the stored one; stale saves are
//! silently dropped.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use strata_core::model::{Snapshot, SnapshotId};
use strata_core::{log_op_end, log_op_error, log_op_start};

use crate::db::Database;
use crate::errors::{from_rusqlite, to_i64, to_u64, Result};

#[derive(Clone)]
pub struct SnapshotStore {
    db: Arc<Database>,
}

impl SnapshotStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or move forward the snapshot stored under `snapshot.id`
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let stream_key = snapshot.id.stream_id.key();
        log_op_start!(
            "save_snapshot",
            stream_id = %stream_key,
            schema_version = snapshot.id.schema_version,
            version = snapshot.version
        );
        let start = Instant::now();

        self.save_impl(snapshot, &stream_key).map_err(|e| {
            log_op_error!(
                "save_snapshot",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                stream_id = %stream_key
            );
            e
        })?;

        log_op_end!(
            "save_snapshot",
            duration_ms = start.elapsed().as_millis() as u64,
            stream_id = %stream_key
        );
        Ok(())
    }

    fn save_impl(&self, snapshot: &Snapshot, stream_key: &str) -> Result<()> {
        let version = to_i64("save_snapshot", snapshot.version)?;
        self.db.with_conn("save_snapshot", |conn| {
            let changed = conn
                .execute(
                    "INSERT INTO snapshots (stream_id, schema_version, type, version, data, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT (stream_id, schema_version) DO UPDATE SET
                         type = excluded.type,
                         version = excluded.version,
                         data = excluded.data,
                         timestamp = excluded.timestamp
                     WHERE excluded.version >= snapshots.version",
                    params![
                        stream_key,
                        snapshot.id.schema_version,
                        snapshot.id.stream_id.stream_type,
                        version,
                        snapshot.state,
                        Utc::now().timestamp_millis(),
                    ],
                )
                .map_err(|e| from_rusqlite("save_snapshot", e))?;

            if changed == 0 {
                tracing::debug!(stream_id = %stream_key, version, "stale snapshot ignored");
            }
            Ok(())
        })
    }

    /// Fetch the snapshot stored under `id`, if any
    pub fn load(&self, id: &SnapshotId) -> Result<Option<Snapshot>> {
        let stream_key = id.stream_id.key();
        log_op_start!(
            "load_snapshot",
            stream_id = %stream_key,
            schema_version = id.schema_version
        );
        let start = Instant::now();

        let snapshot = self.load_impl(id, &stream_key).map_err(|e| {
            log_op_error!(
                "load_snapshot",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                stream_id = %stream_key
            );
            e
        })?;

        log_op_end!(
            "load_snapshot",
            duration_ms = start.elapsed().as_millis() as u64,
            found = snapshot.is_some()
        );
        Ok(snapshot)
    }

    fn load_impl(&self, id: &SnapshotId, stream_key: &str) -> Result<Option<Snapshot>> {
        let row = self.db.with_conn("load_snapshot", |conn| {
            conn.query_row(
                "SELECT version, data FROM snapshots
                 WHERE stream_id = ?1 AND schema_version = ?2",
                params![stream_key, id.schema_version],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)),
            )
            .optional()
            .map_err(|e| from_rusqlite("load_snapshot", e))
        })?;

        row.map(|(version, state)| {
            Ok(Snapshot::new(
                id.clone(),
                to_u64("load_snapshot", version)?,
                state,
            ))
        })
        .transpose()
    }

    /// Remove the snapshot stored under `id`; removing nothing is not an error
    pub fn delete(&self, id: &SnapshotId) -> Result<()> {
        let stream_key = id.stream_id.key();
        log_op_start!(
            "delete_snapshot",
            stream_id = %stream_key,
            schema_version = id.schema_version
        );
        let start = Instant::now();

        let removed = self
            .db
            .with_conn("delete_snapshot", |conn| {
                conn.execute(
                    "DELETE FROM snapshots WHERE stream_id = ?1 AND schema_version = ?2",
                    params![stream_key, id.schema_version],
                )
                .map_err(|e| from_rusqlite("delete_snapshot", e))
            })
            .map_err(|e| {
                log_op_error!(
                    "delete_snapshot",
                    e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    stream_id = %stream_key
                );
                e
            })?;

        log_op_end!(
            "delete_snapshot",
            duration_ms = start.elapsed().as_millis() as u64,
            removed = removed
        );
        Ok(())
    }
}
