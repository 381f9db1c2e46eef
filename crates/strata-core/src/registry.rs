//! Event payload typing and tag-keyed deserialization
//!
//! Appended payloads are stored as JSON next to a type tag. Reading them back
//! goes through an [`EventDeserializer`] injected into the event store, which
//! turns `(tag, bytes)` into the caller's payload type `E` or fails.
//!
//! [`EventRegistry`] is the stock implementation: it maps each tag to a typed
//! JSON decoder registered with [`EventRegistry::register`]. When `E` is an
//! enum over several event structs, derive `Serialize` with
//! `#[serde(untagged)]` so the stored JSON is the bare struct that the
//! registered decoder expects.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{Result, StrataError};

/// A payload that can be appended to a stream
pub trait EventPayload: Serialize {
    /// Type tag stored with the event and used to pick a decoder on read
    fn event_type(&self) -> &str;
}

/// Turns a stored `(event_type, bytes)` pair back into a payload
pub trait EventDeserializer<E>: Send + Sync {
    fn deserialize(&self, event_type: &str, data: &[u8]) -> Result<E>;
}

type DecodeFn<E> = Box<dyn Fn(&[u8]) -> Result<E> + Send + Sync>;

/// Registry mapping type tags to typed JSON decoders
pub struct EventRegistry<E> {
    decoders: HashMap<String, DecodeFn<E>>,
}

impl<E: 'static> EventRegistry<E> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Decode events tagged `event_type` as `T`, then convert into `E`
    ///
    /// Registering the same tag twice replaces the earlier decoder.
    pub fn register<T>(&mut self, event_type: impl Into<String>) -> &mut Self
    where
        T: DeserializeOwned + Into<E> + 'static,
    {
        let decode: DecodeFn<E> = Box::new(|data: &[u8]| {
            let value: T = serde_json::from_slice(data)?;
            Ok(value.into())
        });
        self.decoders.insert(event_type.into(), decode);
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<T>(mut self, event_type: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Into<E> + 'static,
    {
        self.register::<T>(event_type);
        self
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    /// Registered tags, sorted
    pub fn event_types(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl<E: 'static> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> EventDeserializer<E> for EventRegistry<E> {
    fn deserialize(&self, event_type: &str, data: &[u8]) -> Result<E> {
        let decode = self
            .decoders
            .get(event_type)
            .ok_or_else(|| StrataError::UnknownEventType {
                event_type: event_type.to_string(),
            })?;
        decode(data)
    }
}
