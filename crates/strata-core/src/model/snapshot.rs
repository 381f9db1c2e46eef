use serde::{Deserialize, Serialize};

use super::{StreamId, Version};

/// Encoding version of a snapshot's state; several may coexist per stream
pub type SchemaVersion = u32;

/// Key of a snapshot row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId {
    pub stream_id: StreamId,
    pub schema_version: SchemaVersion,
}

impl SnapshotId {
    pub fn new(stream_id: StreamId, schema_version: SchemaVersion) -> Self {
        Self {
            stream_id,
            schema_version,
        }
    }
}

/// Serialized point-in-time state of a stream
///
/// `version` is the stream version the state was built from. The store only
/// ever moves it forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub version: Version,
    pub state: Vec<u8>,
}

impl Snapshot {
    pub fn new(id: SnapshotId, version: Version, state: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            version,
            state: state.into(),
        }
    }
}
