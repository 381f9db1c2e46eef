// Integration tests for store operation logging
// Each test uses its own tenant name since the capture is process-wide

mod common;

use common::{added, setup_manager};
use strata_core::logging_facility::test_capture::init_test_capture;
use strata_core::model::{AppendRequest, Event, StreamId};
use strata_core::types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_ERR_CODE};
use tracing::Level;

#[test]
fn test_create_tenant_logs_start_and_end() {
    // Given: Test capture installed
    let capture = init_test_capture();
    let (_dir, manager) = setup_manager();

    // When: A tenant is created
    manager.create("log-create-1").unwrap();

    // Then: Exactly one start and one end carry the tenant
    let events: Vec<_> = capture
        .events_for("create_tenant")
        .into_iter()
        .filter(|e| e.field("tenant") == Some("log-create-1"))
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(events[1].event.as_deref(), Some(EVENT_END));
    assert!(events[1].field("duration_ms").is_some());
}

#[test]
fn test_missing_tenant_logs_error_code() {
    // Given: Test capture installed
    let capture = init_test_capture();
    let (_dir, manager) = setup_manager();

    // When: A missing tenant is opened
    let _ = manager.get_store("log-missing-2");

    // Then: The end_error event carries the NotFound code at ERROR level
    let errors: Vec<_> = capture
        .events_for("get_store")
        .into_iter()
        .filter(|e| {
            e.field("tenant") == Some("log-missing-2")
                && e.event.as_deref() == Some(EVENT_END_ERROR)
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, Level::ERROR);
    assert_eq!(errors[0].field(FIELD_ERR_CODE), Some("ERR_NOT_FOUND"));
}

#[test]
fn test_append_conflict_logged_as_warning() {
    // Given: A stream at version 1
    let capture = init_test_capture();
    let (_dir, manager) = setup_manager();
    let store = manager.create("log-conflict-3").unwrap();
    let stream = StreamId::new("log-conflict-3", "Account");
    let request = AppendRequest::new(stream.clone(), 1, vec![Event::new(added(1))]);
    store.events().append(&request).unwrap();

    // When: The same first batch is appended again
    let _ = store.events().append(&request);

    // Then: The conflict is a WARN end_error for that stream
    let errors: Vec<_> = capture
        .events_for("append")
        .into_iter()
        .filter(|e| {
            e.field("stream_id") == Some("Account-log-conflict-3")
                && e.event.as_deref() == Some(EVENT_END_ERROR)
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].level, Level::WARN);
    assert_eq!(errors[0].field(FIELD_ERR_CODE), Some("ERR_CONCURRENCY_CONFLICT"));
}
