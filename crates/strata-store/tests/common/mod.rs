use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_core::registry::{EventPayload, EventRegistry};
use strata_store::{StoreConfig, TenantManager};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Added {
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Removed {
    pub amount: i64,
}

/// Payload used across the store tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Counter {
    Added(Added),
    Removed(Removed),
}

impl EventPayload for Counter {
    fn event_type(&self) -> &str {
        match self {
            Counter::Added(_) => "Added",
            Counter::Removed(_) => "Removed",
        }
    }
}

impl From<Added> for Counter {
    fn from(event: Added) -> Self {
        Counter::Added(event)
    }
}

impl From<Removed> for Counter {
    fn from(event: Removed) -> Self {
        Counter::Removed(event)
    }
}

#[allow(dead_code)]
pub fn added(amount: i64) -> Counter {
    Counter::Added(Added { amount })
}

#[allow(dead_code)]
pub fn removed(amount: i64) -> Counter {
    Counter::Removed(Removed { amount })
}

#[allow(dead_code)]
pub fn registry() -> Arc<EventRegistry<Counter>> {
    Arc::new(
        EventRegistry::new()
            .with::<Added>("Added")
            .with::<Removed>("Removed"),
    )
}

/// Manager over a fresh temporary data directory
///
/// The TempDir must outlive the manager.
#[allow(dead_code)]
pub fn setup_manager() -> (TempDir, TenantManager<Counter>) {
    let dir = TempDir::new().expect("Failed to create temp data directory");
    let manager = TenantManager::new(StoreConfig::new(dir.path()), registry())
        .expect("Failed to create tenant manager");
    (dir, manager)
}

/// Files in `dir` ending with `suffix`
#[allow(dead_code)]
pub fn files_ending_with(dir: &std::path::Path, suffix: &str) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|s| s.ends_with(suffix))
                .unwrap_or(false)
        })
        .count()
}
