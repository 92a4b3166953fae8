use super::entity::{Entity, EntityId, StateRecord, StateValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// StateTransitionRecord is an immutable audit row for one committed state change
///
/// Only the store assigns `id`; every other field is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionRecord<I, S> {
    id: Option<i64>,
    subject_id: I,
    machine_id: String,
    source: S,
    target: S,
    created_at: DateTime<Utc>,
}

impl<I, S> StateTransitionRecord<I, S> {
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl<I: EntityId, S: StateValue> Entity for StateTransitionRecord<I, S> {
    type Id = i64;

    const TABLE: &'static str = "state_transition_records";

    const FIELDS: &'static [&'static str] = &[
        "id",
        "subject_id",
        "machine_id",
        "source",
        "target",
        "created_at",
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}

impl<I: EntityId, S: StateValue> StateRecord for StateTransitionRecord<I, S> {
    type SubjectId = I;
    type State = S;

    fn record(machine_id: &str, subject_id: I, source: S, target: S) -> Self {
        Self {
            id: None,
            subject_id,
            machine_id: machine_id.to_string(),
            source,
            target,
            created_at: Utc::now(),
        }
    }

    fn subject_id(&self) -> &I {
        &self.subject_id
    }

    fn source(&self) -> &S {
        &self.source
    }

    fn target(&self) -> &S {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = StateTransitionRecord::<i64, String>::record(
            "order",
            42,
            "pending".to_string(),
            "paid".to_string(),
        );
        assert_eq!(record.id(), None);
        assert_eq!(*record.subject_id(), 42);
        assert_eq!(record.source(), "pending");
        assert_eq!(record.target(), "paid");
        assert_eq!(record.machine_id(), "order");
    }

    #[test]
    fn test_record_serde() {
        let record =
            StateTransitionRecord::<i64, String>::record("m", 1, "a".to_string(), "b".to_string());
        let json = serde_json::to_value(&record).unwrap();
        for field in <StateTransitionRecord<i64, String> as Entity>::FIELDS {
            assert!(json.get(*field).is_some(), "missing {field}");
        }
    }
}
