//! # State Machine Persistence
//!
//! Connects domain-defined state machines to state entity services.
//!
//! ## Key Components
//!
//! - [`persistence`] - [`StateMachinePersist`] and the ready-made
//!   [`EntityStatePersister`]
//! - [`listener`] - post-commit [`StateChangeListener`]s, including the
//!   transition-recording one
//! - [`machine`] - a small table-driven engine and the handler that restores,
//!   transitions and persists in one call
//!
//! Every component that names a machine checks its id when it is built; a
//! blank id is a configuration error.

pub mod context;
pub mod errors;
pub mod listener;
pub mod machine;
pub mod persistence;

pub use context::StateMachineContext;
pub use errors::{StateMachineError, StateMachineResult};
pub use listener::{StateChange, StateChangeListener, TransitionRecordingListener};
pub use machine::{
    DefinedStateMachine, HandledEvent, PersistingStateMachineHandler, StateMachine,
    StateMachineDefinition, StateMachinePersister,
};
pub use persistence::{DynStateListener, EntityStatePersister, IdOf, StateMachinePersist};
