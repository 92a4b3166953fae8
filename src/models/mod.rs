pub mod entity;
pub mod transition_record;

// Re-export model traits for easy access
pub use entity::{Entity, EntityId, StateEntity, StateRecord, StateValue};
pub use transition_record::StateTransitionRecord;
