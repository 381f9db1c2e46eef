use proptest::prelude::*;
use strata_core::{ErrorKind, StrataError, StreamId};

proptest! {
    #[test]
    fn stream_key_recovers_stream_id(id in ".{0,32}", stream_type in "[A-Za-z][A-Za-z0-9_]{0,15}") {
        let stream_id = StreamId::new(id, stream_type.clone());
        let key = stream_id.key();

        prop_assert_eq!(StreamId::from_key(&key, &stream_type), Some(stream_id));
    }

    #[test]
    fn distinct_stream_ids_have_distinct_keys(
        left_type in "[a-c%-]{0,6}",
        left_id in "[a-c%-]{0,6}",
        right_type in "[a-c%-]{0,6}",
        right_id in "[a-c%-]{0,6}"
    ) {
        let left = StreamId::new(left_id, left_type);
        let right = StreamId::new(right_id, right_type);
        prop_assume!(left != right);

        prop_assert_ne!(left.key(), right.key());
    }

    #[test]
    fn stream_key_parses_without_type_hint(id in ".{0,16}", stream_type in ".{0,16}") {
        let stream_id = StreamId::new(id, stream_type);

        prop_assert_eq!(StreamId::parse_key(&stream_id.key()), Some(stream_id));
    }
}

#[test]
fn test_not_found_distinct_from_conflict() {
    let not_found = StrataError::TenantNotFound {
        tenant: "t".to_string(),
    };
    let conflict = StrataError::ConcurrencyConflict {
        stream_id: "Order-1".to_string(),
        expected_version: 1,
    };

    assert_eq!(not_found.kind(), ErrorKind::NotFound);
    assert!(!not_found.is_concurrency_conflict());
    assert!(conflict.is_concurrency_conflict());
}

#[test]
fn test_error_display_mentions_subject() {
    let err = StrataError::SchemaDivergence {
        position: 1,
        expected: "0002_tables".to_string(),
        found: "0002_other".to_string(),
    };
    let text = err.to_string();
    assert!(text.contains("0002_tables"));
    assert!(text.contains("0002_other"));
}
