//! Core types shared across Strata crates
//!
//! This crate provides foundational types used by the event model,
//! the error facility and the logging facility:
//!
//! - **Identifier types**: EventId, CorrelationId, CausationId
//! - **Schema constants**: Canonical field keys and event names for structured logs

pub mod correlation;
pub mod schema;

pub use correlation::{CausationId, CorrelationId, EventId};
