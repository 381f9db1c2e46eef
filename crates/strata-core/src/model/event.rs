use chrono::{DateTime, Utc};
use strata_core_types::{CausationId, CorrelationId, EventId};

use super::{Metadata, Sequence, StreamId, Version};

/// An event supplied by the writer; immutable once appended
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    pub event_id: EventId,
    pub data: E,
}

impl<E> Event<E> {
    /// Wrap a payload with a freshly generated event id
    pub fn new(data: E) -> Self {
        Self {
            event_id: EventId::new(),
            data,
        }
    }

    pub fn with_id(event_id: impl Into<EventId>, data: E) -> Self {
        Self {
            event_id: event_id.into(),
            data,
        }
    }
}

/// An event as read back from storage
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedEvent<E> {
    pub stream_id: StreamId,
    pub event_id: EventId,
    pub event_type: String,
    pub version: Version,
    pub sequence: Sequence,
    pub correlation_id: CorrelationId,
    pub causation_id: CausationId,
    pub metadata: Metadata,
    pub data: E,
    pub timestamp: DateTime<Utc>,
}

/// A batch of events to append to one stream
///
/// `expected_version` is the version the stream will have **after** the
/// batch is applied. The stream must currently be at
/// `expected_version - events.len()`; see [`AppendRequest::start_version`].
#[derive(Debug, Clone)]
pub struct AppendRequest<E> {
    pub stream_id: StreamId,
    pub expected_version: Version,
    pub events: Vec<Event<E>>,
    pub correlation_id: CorrelationId,
    pub causation_id: CausationId,
    pub metadata: Metadata,
}

impl<E> AppendRequest<E> {
    /// Build a request with fresh correlation/causation ids and empty metadata
    pub fn new(stream_id: StreamId, expected_version: Version, events: Vec<Event<E>>) -> Self {
        Self {
            stream_id,
            expected_version,
            events,
            correlation_id: CorrelationId::new(),
            causation_id: CausationId::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<CorrelationId>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_causation_id(mut self, causation_id: impl Into<CausationId>) -> Self {
        self.causation_id = causation_id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The version the stream must be at before this batch
    ///
    /// `None` when the batch holds more events than `expected_version`, which
    /// can never be satisfied.
    pub fn start_version(&self) -> Option<Version> {
        self.expected_version.checked_sub(self.events.len() as u64)
    }

    /// Version assigned to the event at `index` within this batch
    pub fn version_at(&self, start_version: Version, index: usize) -> Version {
        start_version + index as u64 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(expected: Version, n: usize) -> AppendRequest<u32> {
        let events = (0..n).map(|i| Event::new(i as u32)).collect();
        AppendRequest::new(StreamId::new("1", "Counter"), expected, events)
    }

    #[test]
    fn test_start_version_for_first_batch() {
        assert_eq!(request(3, 3).start_version(), Some(0));
    }

    #[test]
    fn test_start_version_for_follow_up_batch() {
        let req = request(5, 2);
        assert_eq!(req.start_version(), Some(3));
        assert_eq!(req.version_at(3, 0), 4);
        assert_eq!(req.version_at(3, 1), 5);
    }

    #[test]
    fn test_start_version_underflow() {
        assert_eq!(request(1, 2).start_version(), None);
    }

    #[test]
    fn test_empty_batch_start_equals_expected() {
        assert_eq!(request(4, 0).start_version(), Some(4));
    }
}
