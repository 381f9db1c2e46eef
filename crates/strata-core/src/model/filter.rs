use super::{Sequence, StreamId, Version};

/// Selection of events for an event store read
///
/// Every field is independently optional; an absent field imposes no
/// constraint. Sequence and version bounds are inclusive. Version bounds are
/// only meaningful together with `stream_id`, but that combination is not
/// enforced. Results are ordered by sequence, ascending unless `descending`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadFilter {
    pub stream_id: Option<StreamId>,
    pub from_sequence: Option<Sequence>,
    pub to_sequence: Option<Sequence>,
    pub from_version: Option<Version>,
    pub to_version: Option<Version>,
    pub count: Option<u64>,
    pub descending: bool,
}

impl ReadFilter {
    /// Every event of every stream, ascending
    pub fn all() -> Self {
        Self::default()
    }

    /// Every event of one stream, ascending
    pub fn stream(stream_id: StreamId) -> Self {
        Self {
            stream_id: Some(stream_id),
            ..Self::default()
        }
    }

    pub fn from_sequence(mut self, sequence: Sequence) -> Self {
        self.from_sequence = Some(sequence);
        self
    }

    pub fn to_sequence(mut self, sequence: Sequence) -> Self {
        self.to_sequence = Some(sequence);
        self
    }

    pub fn from_version(mut self, version: Version) -> Self {
        self.from_version = Some(version);
        self
    }

    pub fn to_version(mut self, version: Version) -> Self {
        self.to_version = Some(version);
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }
}
