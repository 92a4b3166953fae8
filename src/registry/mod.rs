//! # Registry Infrastructure
//!
//! Registries that replace runtime reflection.
//!
//! ## Available Registries
//!
//! - **TypeRegistry**: type arguments each service binds on its generic ancestors
//! - **MethodRegistry**: named mutators an entity exposes for dynamic invocation
//!
//! ## Architecture
//!
//! ```text
//! Registry Infrastructure
//! ├── TypeRegistry      (ServiceDescriptor witnesses, lazily cached bindings)
//! └── MethodRegistry    (validated mutator handles, not-found as None)
//! ```

pub mod method_registry;
pub mod type_registry;

pub use method_registry::{find_declared_method, MethodHandle, MethodRegistry, MethodRegistryBuilder};
pub use type_registry::{GenericAncestor, ServiceDescriptor, TypeRegistry, TypeWitness};
