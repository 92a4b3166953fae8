use crate::query_builder::Association;
use crate::registry::MethodRegistryBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;
use uuid::Uuid;

/// Identifier types a store can assign on insert
pub trait EntityId:
    Clone + Debug + Eq + Ord + Hash + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Produce a fresh id from the store's insert sequence
    ///
    /// `None` once the sequence no longer fits the id type.
    fn generate(sequence: u64) -> Option<Self>;
}

impl EntityId for i64 {
    fn generate(sequence: u64) -> Option<Self> {
        i64::try_from(sequence).ok()
    }
}

impl EntityId for i32 {
    fn generate(sequence: u64) -> Option<Self> {
        i32::try_from(sequence).ok()
    }
}

impl EntityId for u64 {
    fn generate(sequence: u64) -> Option<Self> {
        Some(sequence)
    }
}

impl EntityId for String {
    fn generate(sequence: u64) -> Option<Self> {
        Some(sequence.to_string())
    }
}

impl EntityId for Uuid {
    fn generate(_sequence: u64) -> Option<Self> {
        Some(Uuid::new_v4())
    }
}

/// Values usable as a persisted "current state"
pub trait StateValue:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> StateValue for T where
    T: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// An application-owned persisted record
///
/// Entities are plain serde values. `FIELDS` lists the top-level attributes
/// condition keys may reference; it must contain `ID_FIELD`.
pub trait Entity: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    type Id: EntityId;

    /// Table (or collection) name
    const TABLE: &'static str;

    const ID_FIELD: &'static str = "id";

    /// Declared top-level fields
    const FIELDS: &'static [&'static str];

    /// `None` until the store assigns one
    fn id(&self) -> Option<Self::Id>;

    fn set_id(&mut self, id: Self::Id);

    /// To-one association reachable through a dotted condition field
    fn association(_name: &str) -> Option<Association> {
        None
    }

    /// Named mutators callable through the entity's method registry
    fn declare_mutators(registry: MethodRegistryBuilder<Self>) -> MethodRegistryBuilder<Self> {
        registry
    }
}

/// An entity carrying one mutable "current state" attribute
pub trait StateEntity: Entity {
    type State: StateValue;

    const STATE_FIELD: &'static str = "state";

    fn state(&self) -> Self::State;

    fn set_state(&mut self, next: Self::State) -> &mut Self;

    /// Owned variant of [`StateEntity::set_state`]
    fn with_state(mut self, next: Self::State) -> Self {
        self.set_state(next);
        self
    }
}

/// An audit entity capturing one committed transition
pub trait StateRecord: Entity {
    type SubjectId: EntityId;
    type State: StateValue;

    const SUBJECT_FIELD: &'static str = "subject_id";

    fn record(
        machine_id: &str,
        subject_id: Self::SubjectId,
        source: Self::State,
        target: Self::State,
    ) -> Self;

    fn subject_id(&self) -> &Self::SubjectId;

    fn source(&self) -> &Self::State;

    fn target(&self) -> &Self::State;
}
