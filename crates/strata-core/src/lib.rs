//! Strata Core - event model, error taxonomy and logging facility
//!
//! This crate holds everything the persistence layer needs that is not tied
//! to a particular storage engine:
//! - Stream, event and snapshot models with their version arithmetic
//! - The read filter used for ordered/range event retrieval
//! - The event payload trait and the tag-keyed deserializer registry
//! - The canonical error taxonomy with stable codes
//! - The structured logging facility and its test capture mode

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod registry;

/// Re-exported so the logging macros can name schema constants through `$crate`.
pub use strata_core_types as types;

// Re-export commonly used types
pub use errors::{ErrorKind, Result, StrataError};
pub use model::{
    AppendRequest, Event, Metadata, PersistedEvent, ReadFilter, SchemaVersion, Sequence, Snapshot,
    SnapshotId, StreamId, StreamInfo, Version,
};
pub use registry::{EventDeserializer, EventPayload, EventRegistry};
pub use strata_core_types::{CausationId, CorrelationId, EventId};
