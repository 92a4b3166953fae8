//! # Query Builder System
//!
//! Condition keys, predicate lists and their SQL rendering.
//!
//! ## Key Components
//!
//! - [`conditions`] - condition key grammar, [`PredicateExpression`] and [`Conditions`]
//! - [`joins`] - join kinds and declared associations
//! - [`builder`] - PostgreSQL statement rendering (feature `postgres`)
//!
//! ## Example Usage
//!
//! ```rust
//! use entity_state_core::query_builder::Conditions;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let conditions = Conditions::new()
//!     .with("status", "open")?
//!     .with("OR@total@>=", 100)?;
//! assert_eq!(conditions.len(), 2);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "postgres")]
pub mod builder;
pub mod conditions;
pub mod joins;

pub use conditions::{
    parse, ComparisonOperator, Conditions, Connector, Predicate, PredicateExpression,
};
pub use joins::{Association, Join, JoinKind};
