//! Property-based tests for the resource path grammar.

use proptest::prelude::*;

use super::path::{PathShape, ResourcePath};

/// Strategy to generate valid entity set names.
fn entity_set_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9_-]{0,15}"
}

/// Strategy to generate keys, including quotes that need escaping.
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9' .:-]{1,20}"
}

fn path_strategy() -> impl Strategy<Value = ResourcePath> {
    prop_oneof![
        entity_set_strategy().prop_map(|entity_set| ResourcePath::Collection { entity_set }),
        (entity_set_strategy(), key_strategy())
            .prop_map(|(entity_set, key)| ResourcePath::Entity { entity_set, key }),
        (
            entity_set_strategy(),
            key_strategy(),
            entity_set_strategy(),
            proptest::option::of(key_strategy())
        )
            .prop_map(|(entity_set, key, target, target_key)| {
                ResourcePath::Navigation {
                    entity_set,
                    key,
                    target,
                    target_key,
                }
            }),
        (
            entity_set_strategy(),
            key_strategy(),
            entity_set_strategy(),
            proptest::option::of(key_strategy())
        )
            .prop_map(|(entity_set, key, target, target_key)| ResourcePath::Links {
                entity_set,
                key,
                target,
                target_key,
            }),
    ]
}

proptest! {
    #[test]
    fn test_display_then_parse_is_identity(path in path_strategy()) {
        let rendered = path.to_string();
        let parsed = ResourcePath::parse(&rendered);
        prop_assert!(parsed.is_ok(), "failed to parse {}", rendered);
        prop_assert_eq!(parsed.unwrap(), path);
    }

    #[test]
    fn test_parse_is_deterministic(path in path_strategy()) {
        let rendered = path.to_string();
        let first = ResourcePath::parse(&rendered).unwrap();
        let second = ResourcePath::parse(&rendered).unwrap();
        prop_assert_eq!(first.shape(), second.shape());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_unquoted_keys_are_rejected(set in entity_set_strategy(), key in "[a-z0-9]{1,10}") {
        let input = format!("{set}({key})");
        prop_assert!(ResourcePath::parse(&input).is_err());
    }

    #[test]
    fn test_collection_shape(set in entity_set_strategy()) {
        let path = ResourcePath::parse(&set).unwrap();
        prop_assert_eq!(path.shape(), PathShape::Collection);
    }
}
