//! # Method Registry
//!
//! Named mutators an entity exposes for dynamic invocation.
//!
//! Handlers are registered once with their parameter type and validated when
//! the registry is built. Lookups never fail loudly: an unknown name, a
//! parameter mismatch, a missing registry or the empty [`MethodRegistry::root`]
//! all yield `None`.
//!
//! ## Usage
//!
//! ```rust
//! use entity_state_core::registry::{MethodRegistry, TypeWitness};
//!
//! #[derive(Default)]
//! struct Widget { name: String }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MethodRegistry::<Widget>::builder()
//!     .mutator("set_name", |w: &mut Widget, name: String| w.name = name)
//!     .build()?;
//!
//! let mut widget = Widget::default();
//! let handle = registry
//!     .find("set_name", &[TypeWitness::of::<String>()])
//!     .expect("registered");
//! handle.invoke(&mut widget, serde_json::json!("sprocket"))?;
//! assert_eq!(widget.name, "sprocket");
//! # Ok(())
//! # }
//! ```

use super::type_registry::TypeWitness;
use crate::error::{configuration_error, EntityError, EntityResult};
use crate::models::Entity;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type Mutator<T> = Arc<dyn Fn(&mut T, Value) -> EntityResult<()> + Send + Sync>;

/// A registered mutator with its declared parameter type
pub struct MethodHandle<T> {
    name: String,
    parameter: TypeWitness,
    mutator: Mutator<T>,
}

impl<T> MethodHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[TypeWitness] {
        std::slice::from_ref(&self.parameter)
    }

    /// Deserialize `argument` to the declared parameter type and apply
    pub fn invoke(&self, target: &mut T, argument: Value) -> EntityResult<()> {
        (self.mutator)(target, argument)
    }
}

impl<T> Clone for MethodHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            parameter: self.parameter,
            mutator: Arc::clone(&self.mutator),
        }
    }
}

impl<T> fmt::Debug for MethodHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("name", &self.name)
            .field("parameter", &self.parameter)
            .finish()
    }
}

/// Mutators declared for one entity type, keyed by name
pub struct MethodRegistry<T> {
    owner: TypeWitness,
    methods: HashMap<String, MethodHandle<T>>,
}

impl<T: 'static> MethodRegistry<T> {
    pub fn builder() -> MethodRegistryBuilder<T> {
        MethodRegistryBuilder {
            entries: Vec::new(),
        }
    }

    /// The built-in root: declares nothing
    pub fn root() -> Self {
        Self {
            owner: TypeWitness::of::<T>(),
            methods: HashMap::new(),
        }
    }

    /// Find a mutator by name and exact parameter types
    pub fn find(&self, name: &str, parameter_types: &[TypeWitness]) -> Option<&MethodHandle<T>> {
        self.methods
            .get(name)
            .filter(|handle| handle.parameter_types() == parameter_types)
    }

    /// Find a mutator by name alone
    pub fn get(&self, name: &str) -> Option<&MethodHandle<T>> {
        self.methods.get(name)
    }

    pub fn owner(&self) -> TypeWitness {
        self.owner
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<T: Entity> MethodRegistry<T> {
    /// Build the registry from the entity's declared mutators
    pub fn for_entity() -> EntityResult<Self> {
        T::declare_mutators(Self::builder()).build()
    }
}

impl<T> fmt::Debug for MethodRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort_unstable();
        f.debug_struct("MethodRegistry")
            .field("owner", &self.owner)
            .field("methods", &names)
            .finish()
    }
}

/// Look up a declared mutator, tolerating a missing registry
pub fn find_declared_method<'a, T: 'static>(
    registry: Option<&'a MethodRegistry<T>>,
    name: &str,
    parameter_types: &[TypeWitness],
) -> Option<&'a MethodHandle<T>> {
    let found = registry?.find(name, parameter_types);
    if found.is_none() {
        debug!(method = name, owner = %TypeWitness::of::<T>(), "No declared method");
    }
    found
}

/// Collects mutators and validates them all at build time
pub struct MethodRegistryBuilder<T> {
    entries: Vec<MethodHandle<T>>,
}

impl<T: 'static> MethodRegistryBuilder<T> {
    /// Register a mutator taking one argument of type `A`
    pub fn mutator<A, F>(mut self, name: &str, mutator: F) -> Self
    where
        A: DeserializeOwned + 'static,
        F: Fn(&mut T, A) + Send + Sync + 'static,
    {
        let handle_name = name.to_string();
        let erased: Mutator<T> = Arc::new(move |target: &mut T, argument: Value| {
            let argument = serde_json::from_value::<A>(argument).map_err(|e| {
                EntityError::InvalidMutatorArgument {
                    name: handle_name.clone(),
                    reason: e.to_string(),
                }
            })?;
            mutator(target, argument);
            Ok(())
        });

        self.entries.push(MethodHandle {
            name: name.to_string(),
            parameter: TypeWitness::of::<A>(),
            mutator: erased,
        });
        self
    }

    /// Validate and freeze the registry
    ///
    /// Blank or duplicate names are configuration errors.
    pub fn build(self) -> EntityResult<MethodRegistry<T>> {
        let owner = TypeWitness::of::<T>();
        let mut methods = HashMap::with_capacity(self.entries.len());

        for handle in self.entries {
            if handle.name.trim().is_empty() {
                return Err(configuration_error(format!(
                    "Blank mutator name registered for {owner}"
                )));
            }
            if methods.contains_key(&handle.name) {
                return Err(configuration_error(format!(
                    "Mutator '{}' registered twice for {owner}",
                    handle.name
                )));
            }
            methods.insert(handle.name.clone(), handle);
        }

        Ok(MethodRegistry { owner, methods })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Gadget {
        label: String,
        count: u32,
    }

    impl Gadget {
        fn set_label(&mut self, label: String) {
            self.label = label;
        }
    }

    fn gadget_registry() -> MethodRegistry<Gadget> {
        MethodRegistry::builder()
            .mutator("set_label", |g: &mut Gadget, label: String| g.set_label(label))
            .mutator("set_count", |g: &mut Gadget, count: u32| g.count = count)
            .build()
            .unwrap()
    }

    #[test]
    fn test_missing_registry_and_root_are_not_found() {
        assert!(find_declared_method::<Gadget>(None, "set_label", &[]).is_none());

        let root = MethodRegistry::<Gadget>::root();
        assert!(root.is_empty());
        assert!(find_declared_method(
            Some(&root),
            "set_label",
            &[TypeWitness::of::<String>()]
        )
        .is_none());
    }

    #[test]
    fn test_parameter_types_must_match() {
        let registry = gadget_registry();
        assert!(registry
            .find("set_count", &[TypeWitness::of::<u32>()])
            .is_some());
        assert!(registry
            .find("set_count", &[TypeWitness::of::<String>()])
            .is_none());
        assert!(registry.find("set_count", &[]).is_none());
        assert_eq!(registry.names(), vec!["set_count", "set_label"]);
    }

    #[test]
    fn test_dynamic_invoke_matches_direct_call() {
        let registry = gadget_registry();

        let mut direct = Gadget::default();
        direct.set_label("lever".to_string());

        let mut dynamic = Gadget::default();
        let handle =
            find_declared_method(Some(&registry), "set_label", &[TypeWitness::of::<String>()])
                .unwrap();
        handle
            .invoke(&mut dynamic, serde_json::json!("lever"))
            .unwrap();

        assert_eq!(direct.label, dynamic.label);
        assert_eq!(direct, dynamic);
    }

    #[test]
    fn test_invalid_argument() {
        let registry = gadget_registry();
        let mut gadget = Gadget::default();
        let err = registry
            .get("set_count")
            .unwrap()
            .invoke(&mut gadget, serde_json::json!("many"))
            .unwrap_err();
        assert!(matches!(err, EntityError::InvalidMutatorArgument { .. }));
        assert_eq!(gadget.count, 0);
    }

    #[test]
    fn test_build_rejects_duplicates_and_blanks() {
        let duplicate = MethodRegistry::<Gadget>::builder()
            .mutator("set_count", |g: &mut Gadget, c: u32| g.count = c)
            .mutator("set_count", |g: &mut Gadget, c: u32| g.count = c + 1)
            .build();
        assert!(matches!(duplicate, Err(EntityError::Configuration { .. })));

        let blank = MethodRegistry::<Gadget>::builder()
            .mutator("  ", |g: &mut Gadget, c: u32| g.count = c)
            .build();
        assert!(matches!(blank, Err(EntityError::Configuration { .. })));
    }
}
