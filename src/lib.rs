#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Entity State Core
//!
//! Generic-aware entity services, condition-key predicates and state-machine
//! persistence.
//!
//! ## Overview
//!
//! Application code declares entities as plain serde values and builds
//! concrete services by implementing the generic service traits. The
//! identifier, entity and state types a service binds are recorded as type
//! witnesses when the service is constructed, so they can be recovered
//! without the caller restating them. Queries are expressed as compact
//! condition keys (`OR@customer.name@like@LEFT`) so every entity type shares
//! one dynamic-predicate code path. A small persistence adapter reads and
//! writes one "current state" attribute transactionally on behalf of a state
//! machine.
//!
//! ## Module Organization
//!
//! - [`models`] - entity traits and the transition record entity
//! - [`query_builder`] - condition key grammar, joins and SQL rendering
//! - [`registry`] - type witnesses and named mutator handles
//! - [`database`] - unit-of-work seam with in-memory and PostgreSQL executors
//! - [`services`] - entity, state and transition-record service traits
//! - [`state_machine`] - persistence adapter, listeners and engine seam
//! - [`config`] - layered configuration
//! - [`error`] - structured error handling
//! - [`logging`] - structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use entity_state_core::{Conditions, EntityContext, EntityService, InMemoryExecutor};
//! use std::sync::Arc;
//!
//! let context = EntityContext::default();
//! let repository = context.state_repository::<OrderService>(Arc::new(InMemoryExecutor::new()))?;
//! let orders = OrderService { repository };
//!
//! let order = orders.save(Order::new("ann")).await?;
//! let found = orders
//!     .find_one(&Conditions::new().with("OR@customer.name@like@LEFT", "a%")?, true)
//!     .await?;
//! ```

pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod query_builder;
pub mod registry;
pub mod services;
pub mod state_machine;

pub use config::EntityConfig;
pub use context::EntityContext;
pub use database::{finish, rollback, InMemoryExecutor, QueryExecutor, UnitOfWork};
#[cfg(feature = "postgres")]
pub use database::PgExecutor;
pub use error::{EntityError, EntityResult};
pub use models::{Entity, EntityId, StateEntity, StateRecord, StateTransitionRecord, StateValue};
pub use query_builder::{parse, Conditions, Connector, JoinKind, PredicateExpression};
pub use registry::{find_declared_method, GenericAncestor, MethodRegistry, TypeRegistry, TypeWitness};
pub use services::{
    EntityRepository, EntityService, StateEntityService, StateOf, StateRecordEntityService,
};
pub use state_machine::{
    DefinedStateMachine, EntityStatePersister, PersistingStateMachineHandler, StateMachine,
    StateMachineContext, StateMachineDefinition, StateMachineError, StateMachinePersist,
    StateMachinePersister, TransitionRecordingListener,
};
