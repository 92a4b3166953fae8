//! # Entity Services
//!
//! Generic service traits concrete services implement.
//!
//! - [`EntityService`] - CRUD over (Id, Entity)
//! - [`StateEntityService`] - adds transactional "current state" writes
//! - [`StateRecordEntityService`] - persists transition records
//!
//! A concrete service is a small struct holding an [`EntityRepository`]
//! obtained from [`crate::EntityContext`]; every operation is provided by the
//! traits.

pub mod entity_service;
pub mod record_service;
pub mod state_service;

pub use entity_service::{EntityRepository, EntityService};
pub use record_service::StateRecordEntityService;
pub use state_service::{StateEntityService, StateOf};
