//! Domain models for the event log

pub mod event;
pub mod filter;
pub mod metadata;
pub mod snapshot;
pub mod stream;

pub use event::{AppendRequest, Event, PersistedEvent};
pub use filter::ReadFilter;
pub use metadata::Metadata;
pub use snapshot::{SchemaVersion, Snapshot, SnapshotId};
pub use stream::{StreamId, StreamInfo};

/// Stream-relative, 1-based, contiguous position of an event; also a stream's event count
pub type Version = u64;

/// Store-global, strictly increasing position assigned on insert
pub type Sequence = u64;
