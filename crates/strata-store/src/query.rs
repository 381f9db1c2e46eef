//! Event selection built from a [`ReadFilter`]
//!
//! Each present filter field becomes one typed predicate; predicates are
//! joined with AND and every value is passed as a bound parameter.

use rusqlite::types::Value;
use strata_core::model::ReadFilter;

use crate::errors::{to_i64, Result};

pub(crate) const EVENT_COLUMNS: &str = "e.stream_id, s.stream_type, e.event_id, e.event_type, \
     e.version, e.data, e.sequence, e.correlation_id, e.causation_id, e.metadata, e.timestamp";

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    StreamIs(String),
    SequenceAtLeast(i64),
    SequenceAtMost(i64),
    VersionAtLeast(i64),
    VersionAtMost(i64),
}

impl Predicate {
    fn column_op(&self) -> &'static str {
        match self {
            Predicate::StreamIs(_) => "e.stream_id =",
            Predicate::SequenceAtLeast(_) => "e.sequence >=",
            Predicate::SequenceAtMost(_) => "e.sequence <=",
            Predicate::VersionAtLeast(_) => "e.version >=",
            Predicate::VersionAtMost(_) => "e.version <=",
        }
    }

    fn value(&self) -> Value {
        match self {
            Predicate::StreamIs(key) => Value::Text(key.clone()),
            Predicate::SequenceAtLeast(n)
            | Predicate::SequenceAtMost(n)
            | Predicate::VersionAtLeast(n)
            | Predicate::VersionAtMost(n) => Value::Integer(*n),
        }
    }
}

/// A compiled `SELECT` over the events table
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EventQuery {
    predicates: Vec<Predicate>,
    descending: bool,
    limit: Option<i64>,
}

impl EventQuery {
    pub(crate) fn from_filter(filter: &ReadFilter) -> Result<Self> {
        let mut predicates = Vec::new();
        if let Some(stream_id) = &filter.stream_id {
            predicates.push(Predicate::StreamIs(stream_id.key()));
        }
        if let Some(n) = filter.from_sequence {
            predicates.push(Predicate::SequenceAtLeast(to_i64("from_sequence", n)?));
        }
        if let Some(n) = filter.to_sequence {
            predicates.push(Predicate::SequenceAtMost(to_i64("to_sequence", n)?));
        }
        if let Some(n) = filter.from_version {
            predicates.push(Predicate::VersionAtLeast(to_i64("from_version", n)?));
        }
        if let Some(n) = filter.to_version {
            predicates.push(Predicate::VersionAtMost(to_i64("to_version", n)?));
        }
        let limit = filter
            .count
            .map(|n| to_i64("count", n))
            .transpose()?;

        Ok(Self {
            predicates,
            descending: filter.descending,
            limit,
        })
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = format!(
            "SELECT {} FROM events e JOIN streams s ON s.stream_id = e.stream_id",
            EVENT_COLUMNS
        );

        let clauses: Vec<String> = self
            .predicates
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{} ?{}", p.column_op(), i + 1))
            .collect();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(" ORDER BY e.sequence");
        sql.push_str(if self.descending { " DESC" } else { " ASC" });

        if self.limit.is_some() {
            sql.push_str(&format!(" LIMIT ?{}", self.predicates.len() + 1));
        }
        sql
    }

    pub(crate) fn params(&self) -> Vec<Value> {
        let mut params: Vec<Value> = self.predicates.iter().map(Predicate::value).collect();
        if let Some(limit) = self.limit {
            params.push(Value::Integer(limit));
        }
        params
    }
}
