use entity_state_core::query_builder::{parse, Connector, JoinKind, PredicateExpression};
use entity_state_core::EntityError;
use proptest::prelude::*;

fn field_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z_][a-z0-9_]{0,8}", 1..4).prop_map(|segments| segments.join("."))
}

fn operator_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        Just("=".to_string()),
        Just(">=".to_string()),
        Just("<>".to_string()),
        Just("like".to_string()),
        Just("in".to_string()),
        Just("not_null".to_string()),
        "[a-z<>=!~]{1,6}",
    ])
}

fn connector_strategy() -> impl Strategy<Value = Connector> {
    prop_oneof![Just(Connector::And), Just(Connector::Or)]
}

fn join_strategy() -> impl Strategy<Value = Option<JoinKind>> {
    prop::option::of(prop_oneof![
        Just(JoinKind::Inner),
        Just(JoinKind::Left),
        Just(JoinKind::Right),
    ])
}

prop_compose! {
    fn expression_strategy()(
        field in field_strategy(),
        operator in operator_strategy(),
        connector in connector_strategy(),
        join_kind in join_strategy(),
    ) -> PredicateExpression {
        PredicateExpression { field, operator, connector, join_kind }
    }
}

proptest! {
    /// Property: the canonical key form reparses to the same expression
    #[test]
    fn canonical_keys_reparse_identically(expression in expression_strategy()) {
        let key = expression.to_string();
        let reparsed = parse(&key).unwrap();
        prop_assert_eq!(reparsed, expression);
    }

    /// Property: a key without connector or join tag defaults to AND with no join
    #[test]
    fn bare_keys_use_defaults(field in field_strategy(), operator in operator_strategy()) {
        let key = match &operator {
            Some(op) => format!("{field}@{op}"),
            None => field.clone(),
        };
        let expression = parse(&key).unwrap();
        prop_assert_eq!(expression.connector, Connector::And);
        prop_assert_eq!(expression.join_kind, None);
        prop_assert_eq!(expression.field, field);
        prop_assert_eq!(expression.operator, operator);
    }

    /// Property: arbitrary input never panics and only fails as a malformed predicate
    #[test]
    fn arbitrary_input_never_panics(key in "\\PC{0,40}") {
        if let Err(err) = parse(&key) {
            let is_malformed = matches!(err, EntityError::MalformedPredicate { .. });
            prop_assert!(is_malformed);
        }
    }

    /// Property: a field broken by whitespace is never isolable
    #[test]
    fn fields_with_whitespace_are_rejected(left in "[a-z]{1,6}", right in "[a-z]{1,6}") {
        let key = format!("{left} {right}@=");
        prop_assert!(parse(&key).is_err());
    }
}
