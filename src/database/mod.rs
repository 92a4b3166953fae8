//! # Storage Executors
//!
//! The seam between entity services and the store.
//!
//! ## Overview
//!
//! Services never talk to a database directly. They open a [`UnitOfWork`]
//! from a [`QueryExecutor`], run their reads and writes inside it, and hand it
//! to [`finish`], which commits or rolls back depending on the outcome.
//!
//! ## Key Components
//!
//! - [`executor`] - unit-of-work and executor traits plus the commit helpers
//! - [`memory`] - serializable in-memory table for tests and development
//! - `postgres` - PostgreSQL executor over a `sqlx` pool (feature `postgres`)
//!
//! ## Locking
//!
//! Reads issued with `lock` hold their rows until the unit of work ends.
//! PostgreSQL uses `SELECT ... FOR UPDATE`; the in-memory table serializes
//! whole units of work. A unit of work must not open a second one on the
//! same executor while it is held.

pub mod executor;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use executor::{finish, rollback, QueryExecutor, UnitOfWork};
pub use memory::InMemoryExecutor;
#[cfg(feature = "postgres")]
pub use postgres::PgExecutor;
