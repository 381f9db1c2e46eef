//! Per-tenant event store
//!
//! Appends are guarded by the stream row's version: the first batch of a
//! stream inserts the row, every later batch moves it forward with a
//! compare-and-set UPDATE. Both happen in the same IMMEDIATE transaction as
//! the event inserts, so a batch is either fully visible or not at all.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension, Transaction, TransactionBehavior};
use strata_core::errors::StrataError;
use strata_core::model::{
    AppendRequest, Metadata, PersistedEvent, ReadFilter, Sequence, StreamId, StreamInfo, Version,
};
use strata_core::registry::{EventDeserializer, EventPayload};
use strata_core::{log_op_end, log_op_error, log_op_start};
use strata_core::{CausationId, CorrelationId, EventId};

use crate::db::Database;
use crate::errors::{
    concurrency_conflict, from_rusqlite, invalid_input, is_unique_violation, to_i64, to_u64,
    Result,
};
use crate::query::EventQuery;

/// Event row as stored, before payload decoding
struct StoredEvent {
    stream_key: String,
    stream_type: String,
    event_id: String,
    event_type: String,
    version: i64,
    data: String,
    sequence: i64,
    correlation_id: String,
    causation_id: String,
    metadata: String,
    timestamp: i64,
}

/// Payload already encoded for insertion
struct EncodedEvent {
    event_id: String,
    event_type: String,
    data: String,
}

/// Append/read access to one tenant's event log
pub struct EventStore<E> {
    db: Arc<Database>,
    deserializer: Arc<dyn EventDeserializer<E>>,
}

impl<E> Clone for EventStore<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            deserializer: self.deserializer.clone(),
        }
    }
}

impl<E> EventStore<E> {
    /// Bind a store to a migrated database
    pub fn new(db: Arc<Database>, deserializer: Arc<dyn EventDeserializer<E>>) -> Self {
        Self { db, deserializer }
    }

    /// Append a batch to a stream under its expected-version guard
    ///
    /// `request.expected_version` is the stream's version after the batch.
    /// Fails with `ConcurrencyConflict` when the stream is not currently at
    /// `expected_version - events.len()`, including when a first batch finds
    /// the stream already created. Nothing is written on any failure.
    ///
    /// An empty batch writes nothing and only checks the precondition.
    pub fn append(&self, request: &AppendRequest<E>) -> Result<()>
    where
        E: EventPayload,
    {
        let stream_key = request.stream_id.key();
        log_op_start!(
            "append",
            stream_id = %stream_key,
            expected_version = request.expected_version,
            event_count = request.events.len()
        );
        let start = Instant::now();

        self.append_impl(request, &stream_key).map_err(|e| {
            log_op_error!(
                "append",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                stream_id = %stream_key
            );
            e
        })?;

        log_op_end!(
            "append",
            duration_ms = start.elapsed().as_millis() as u64,
            stream_id = %stream_key
        );
        Ok(())
    }

    fn append_impl(&self, request: &AppendRequest<E>, stream_key: &str) -> Result<()>
    where
        E: EventPayload,
    {
        let start_version = request.start_version().ok_or_else(|| {
            invalid_input(format!(
                "batch of {} events cannot end at version {}",
                request.events.len(),
                request.expected_version
            ))
        })?;
        let expected = to_i64("append", request.expected_version)?;
        let start_at = to_i64("append", start_version)?;

        // Encode outside the connection lock.
        let metadata = serde_json::to_string(&request.metadata)?;
        let encoded = request
            .events
            .iter()
            .map(|event| {
                Ok(EncodedEvent {
                    event_id: event.event_id.as_str().to_string(),
                    event_type: event.data.event_type().to_string(),
                    data: serde_json::to_string(&event.data)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.db.with_conn("append", |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| from_rusqlite("append", e))?;
            let now = Utc::now().timestamp_millis();

            if encoded.is_empty() {
                return check_version(&tx, stream_key, start_version, request.expected_version);
            }

            if start_version == 0 {
                let inserted = tx.execute(
                    "INSERT INTO streams (stream_id, version, stream_type, timestamp)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![stream_key, expected, request.stream_id.stream_type, now],
                );
                match inserted {
                    Ok(_) => {}
                    Err(e) if is_unique_violation(&e) => {
                        return Err(concurrency_conflict(stream_key, request.expected_version));
                    }
                    Err(e) => return Err(from_rusqlite("append", e)),
                }
            } else {
                let updated = tx
                    .execute(
                        "UPDATE streams SET version = ?1, timestamp = ?2
                         WHERE stream_id = ?3 AND version = ?4",
                        params![expected, now, stream_key, start_at],
                    )
                    .map_err(|e| from_rusqlite("append", e))?;
                if updated == 0 {
                    return Err(concurrency_conflict(stream_key, request.expected_version));
                }
            }

            {
                let mut stmt = tx
                    .prepare_cached(
                        "INSERT INTO events (stream_id, event_id, event_type, version, data,
                             correlation_id, causation_id, metadata, timestamp)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    )
                    .map_err(|e| from_rusqlite("append", e))?;
                for (index, event) in encoded.iter().enumerate() {
                    let version = to_i64("append", request.version_at(start_version, index))?;
                    stmt.execute(params![
                        stream_key,
                        event.event_id,
                        event.event_type,
                        version,
                        event.data,
                        request.correlation_id.as_str(),
                        request.causation_id.as_str(),
                        metadata,
                        now,
                    ])
                    .map_err(|e| from_rusqlite("append", e))?;
                }
            }

            tx.commit().map_err(|e| from_rusqlite("append", e))?;
            tracing::debug!(
                stream_id = %stream_key,
                from_version = start_version + 1,
                to_version = request.expected_version,
                "appended events"
            );
            Ok(())
        })
    }

    /// Read events matching `filter`, ordered by sequence
    ///
    /// Every payload is decoded through the injected deserializer; a single
    /// decoding failure fails the whole read.
    pub fn read(&self, filter: &ReadFilter) -> Result<Vec<PersistedEvent<E>>> {
        let stream_key = filter.stream_id.as_ref().map(StreamId::key);
        log_op_start!("read", stream_id = ?stream_key, descending = filter.descending);
        let start = Instant::now();

        let events = self.read_impl(filter).map_err(|e| {
            log_op_error!(
                "read",
                e,
                duration_ms = start.elapsed().as_millis() as u64,
                stream_id = ?stream_key
            );
            e
        })?;

        log_op_end!(
            "read",
            duration_ms = start.elapsed().as_millis() as u64,
            event_count = events.len()
        );
        Ok(events)
    }

    fn read_impl(&self, filter: &ReadFilter) -> Result<Vec<PersistedEvent<E>>> {
        let query = EventQuery::from_filter(filter)?;
        let sql = query.sql();
        let params = query.params();

        let rows = self.db.with_conn("read", |conn| {
            let mut stmt = conn.prepare_cached(&sql).map_err(|e| from_rusqlite("read", e))?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    Ok(StoredEvent {
                        stream_key: row.get(0)?,
                        stream_type: row.get(1)?,
                        event_id: row.get(2)?,
                        event_type: row.get(3)?,
                        version: row.get(4)?,
                        data: row.get(5)?,
                        sequence: row.get(6)?,
                        correlation_id: row.get(7)?,
                        causation_id: row.get(8)?,
                        metadata: row.get(9)?,
                        timestamp: row.get(10)?,
                    })
                })
                .map_err(|e| from_rusqlite("read", e))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| from_rusqlite("read", e))?;
            Ok(rows)
        })?;

        rows.into_iter().map(|row| self.decode(row)).collect()
    }

    fn decode(&self, row: StoredEvent) -> Result<PersistedEvent<E>> {
        let stream_id = StreamId::from_key(&row.stream_key, &row.stream_type).ok_or_else(|| {
            StrataError::Storage {
                op: "read".to_string(),
                message: format!(
                    "stream key '{}' does not match type '{}'",
                    row.stream_key, row.stream_type
                ),
            }
        })?;
        let data = self
            .deserializer
            .deserialize(&row.event_type, row.data.as_bytes())?;
        let metadata: Metadata = serde_json::from_str(&row.metadata)?;

        Ok(PersistedEvent {
            stream_id,
            event_id: EventId::from_string(row.event_id),
            event_type: row.event_type,
            version: to_u64("read", row.version)?,
            sequence: to_u64("read", row.sequence)?,
            correlation_id: CorrelationId::from_string(row.correlation_id),
            causation_id: CausationId::from_string(row.causation_id),
            metadata,
            data,
            timestamp: timestamp_from_millis("read", row.timestamp)?,
        })
    }

    /// Current head of a stream; `None` if nothing was ever appended to it
    pub fn stream_info(&self, stream_id: &StreamId) -> Result<Option<StreamInfo>> {
        let key = stream_id.key();
        let row = self.db.with_conn("stream_info", |conn| {
            conn.query_row(
                "SELECT version, timestamp FROM streams WHERE stream_id = ?1",
                [&key],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .map_err(|e| from_rusqlite("stream_info", e))
        })?;

        row.map(|(version, timestamp)| {
            Ok(StreamInfo {
                stream_id: stream_id.clone(),
                version: to_u64("stream_info", version)?,
                last_modified: timestamp_from_millis("stream_info", timestamp)?,
            })
        })
        .transpose()
    }

    /// Highest sequence assigned so far; 0 for an empty log
    pub fn head_sequence(&self) -> Result<Sequence> {
        let head: i64 = self.db.with_conn("head_sequence", |conn| {
            conn.query_row("SELECT COALESCE(MAX(sequence), 0) FROM events", [], |row| {
                row.get(0)
            })
            .map_err(|e| from_rusqlite("head_sequence", e))
        })?;
        to_u64("head_sequence", head)
    }
}

/// Precondition check for an empty batch; writes nothing
fn check_version(
    tx: &Transaction<'_>,
    stream_key: &str,
    start_version: Version,
    expected_version: Version,
) -> Result<()> {
    let current: Option<i64> = tx
        .query_row(
            "SELECT version FROM streams WHERE stream_id = ?1",
            [stream_key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| from_rusqlite("append", e))?;

    let current = current.map(|v| to_u64("append", v)).transpose()?;
    let satisfied = match current {
        None => start_version == 0,
        Some(version) => version == start_version,
    };
    if satisfied {
        Ok(())
    } else {
        Err(concurrency_conflict(stream_key, expected_version))
    }
}

fn timestamp_from_millis(op: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StrataError::Storage {
        op: op.to_string(),
        message: format!("invalid timestamp {}", millis),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::MigrationRunner;
    use serde::{Deserialize, Serialize};
    use strata_core::model::Event;
    use strata_core::registry::EventRegistry;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ticked {
        n: u32,
    }

    impl EventPayload for Ticked {
        fn event_type(&self) -> &str {
            "Ticked"
        }
    }

    fn store() -> EventStore<Ticked> {
        let db = Database::open_in_memory().unwrap();
        db.with_conn("test", |conn| MigrationRunner::embedded().apply_all(conn))
            .unwrap();
        let registry = EventRegistry::<Ticked>::new().with::<Ticked>("Ticked");
        EventStore::new(Arc::new(db), Arc::new(registry))
    }

    fn batch(stream: &StreamId, expected: Version, ns: &[u32]) -> AppendRequest<Ticked> {
        let events = ns.iter().map(|n| Event::new(Ticked { n: *n })).collect();
        AppendRequest::new(stream.clone(), expected, events)
    }

    #[test]
    fn test_batch_larger_than_expected_version_is_invalid() {
        let store = store();
        let stream = StreamId::new("1", "Clock");

        let err = store.append(&batch(&stream, 1, &[1, 2])).unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_INPUT");
    }

    #[test]
    fn test_empty_batch_on_missing_stream() {
        let store = store();
        let stream = StreamId::new("1", "Clock");

        store.append(&batch(&stream, 0, &[])).unwrap();
        let err = store.append(&batch(&stream, 2, &[])).unwrap_err();
        assert!(err.is_concurrency_conflict());
        assert_eq!(store.stream_info(&stream).unwrap(), None);
    }

    #[test]
    fn test_empty_batch_checks_current_version() {
        let store = store();
        let stream = StreamId::new("1", "Clock");
        store.append(&batch(&stream, 2, &[1, 2])).unwrap();

        store.append(&batch(&stream, 2, &[])).unwrap();
        assert!(store.append(&batch(&stream, 3, &[])).is_err());
        assert_eq!(store.head_sequence().unwrap(), 2);
    }

    #[test]
    fn test_stream_info_tracks_version() {
        let store = store();
        let stream = StreamId::new("1", "Clock");
        store.append(&batch(&stream, 1, &[1])).unwrap();
        store.append(&batch(&stream, 3, &[2, 3])).unwrap();

        let info = store.stream_info(&stream).unwrap().unwrap();
        assert_eq!(info.version, 3);
        assert_eq!(info.stream_id, stream);
    }
}
