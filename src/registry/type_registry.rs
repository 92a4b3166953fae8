//! # Type Registry
//!
//! Records the concrete type arguments each service binds on its generic
//! ancestors, and resolves them on demand.
//!
//! Services are built through [`crate::EntityContext`], which registers a
//! [`ServiceDescriptor`] holding explicit [`TypeWitness`]es for the service's
//! associated types. A resolve for a (service, ancestor) pair is computed on
//! first use from the descriptor and cached for the registry's lifetime.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = TypeRegistry::new();
//! registry.register(ServiceDescriptor::state_entity_service::<OrderService>());
//!
//! let bound = registry.resolve_for::<OrderService>(GenericAncestor::StateEntityService);
//! assert_eq!(&*bound, &[TypeWitness::of::<i64>(), TypeWitness::of::<OrderState>(), TypeWitness::of::<Order>()]);
//! ```

use crate::models::StateRecord;
use crate::services::{EntityService, StateEntityService, StateOf, StateRecordEntityService};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// Runtime witness of a concrete type
#[derive(Debug, Clone, Copy)]
pub struct TypeWitness {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeWitness {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeWitness {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeWitness {}

impl Hash for TypeWitness {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for TypeWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Generic service traits a concrete service may descend from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericAncestor {
    /// Binds (Id, Entity)
    EntityService,
    /// Binds (Id, State, Entity)
    StateEntityService,
    /// Binds (SubjectId, State, Entity)
    StateRecordEntityService,
}

impl fmt::Display for GenericAncestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntityService => write!(f, "EntityService"),
            Self::StateEntityService => write!(f, "StateEntityService"),
            Self::StateRecordEntityService => write!(f, "StateRecordEntityService"),
        }
    }
}

/// Explicit type witnesses a service was built with
///
/// Bindings are ordered from the most derived ancestor to the root.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    service: TypeWitness,
    bindings: Vec<(GenericAncestor, Vec<TypeWitness>)>,
}

impl ServiceDescriptor {
    pub fn entity_service<S: EntityService>() -> Self {
        Self {
            service: TypeWitness::of::<S>(),
            bindings: vec![Self::entity_binding::<S>()],
        }
    }

    pub fn state_entity_service<S: StateEntityService>() -> Self {
        Self {
            service: TypeWitness::of::<S>(),
            bindings: vec![
                (
                    GenericAncestor::StateEntityService,
                    vec![
                        TypeWitness::of::<S::Id>(),
                        TypeWitness::of::<StateOf<S>>(),
                        TypeWitness::of::<S::Entity>(),
                    ],
                ),
                Self::entity_binding::<S>(),
            ],
        }
    }

    pub fn state_record_service<S: StateRecordEntityService>() -> Self {
        Self {
            service: TypeWitness::of::<S>(),
            bindings: vec![
                (
                    GenericAncestor::StateRecordEntityService,
                    vec![
                        TypeWitness::of::<<S::Entity as StateRecord>::SubjectId>(),
                        TypeWitness::of::<<S::Entity as StateRecord>::State>(),
                        TypeWitness::of::<S::Entity>(),
                    ],
                ),
                Self::entity_binding::<S>(),
            ],
        }
    }

    fn entity_binding<S: EntityService>() -> (GenericAncestor, Vec<TypeWitness>) {
        (
            GenericAncestor::EntityService,
            vec![TypeWitness::of::<S::Id>(), TypeWitness::of::<S::Entity>()],
        )
    }

    pub fn service(&self) -> TypeWitness {
        self.service
    }

    /// Walk the ancestry, closest first, until `ancestor` is found
    pub fn binding(&self, ancestor: GenericAncestor) -> Option<&[TypeWitness]> {
        self.bindings
            .iter()
            .find(|(candidate, _)| *candidate == ancestor)
            .map(|(_, witnesses)| witnesses.as_slice())
    }

    pub fn ancestors(&self) -> impl Iterator<Item = GenericAncestor> + '_ {
        self.bindings.iter().map(|(ancestor, _)| *ancestor)
    }

    /// Copy of `self` extended with the ancestors only `other` declares
    ///
    /// Existing bindings are kept as they are, so anything already resolved
    /// from `self` stays valid.
    fn merged_with(&self, other: &ServiceDescriptor) -> Option<ServiceDescriptor> {
        let missing: Vec<_> = other
            .bindings
            .iter()
            .filter(|(ancestor, _)| self.binding(*ancestor).is_none())
            .cloned()
            .collect();
        if missing.is_empty() {
            return None;
        }
        let mut merged = self.clone();
        merged.bindings.extend(missing);
        Some(merged)
    }
}

/// Registry of service descriptors with a lazily filled binding cache
#[derive(Debug, Default)]
pub struct TypeRegistry {
    descriptors: DashMap<TypeId, Arc<ServiceDescriptor>>,
    bindings: DashMap<(TypeId, GenericAncestor), Arc<[TypeWitness]>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor
    ///
    /// A service registered again through a different ancestry keeps its
    /// existing bindings and gains the ancestors it did not have yet.
    pub fn register(&self, descriptor: ServiceDescriptor) -> Arc<ServiceDescriptor> {
        let service = descriptor.service();
        match self.descriptors.entry(service.type_id()) {
            Entry::Vacant(vacant) => {
                debug!(service = %service, "Registering service descriptor");
                Arc::clone(vacant.insert(Arc::new(descriptor)).value())
            }
            Entry::Occupied(mut occupied) => {
                if let Some(merged) = occupied.get().merged_with(&descriptor) {
                    debug!(service = %service, "Extending service descriptor ancestry");
                    occupied.insert(Arc::new(merged));
                }
                Arc::clone(occupied.get())
            }
        }
    }

    pub fn descriptor(&self, service: TypeId) -> Option<Arc<ServiceDescriptor>> {
        self.descriptors.get(&service).map(|d| Arc::clone(d.value()))
    }

    /// Resolve the ordered type arguments `service` binds on `ancestor`
    ///
    /// Returns an empty list when the service is unknown or does not descend
    /// from `ancestor`. Empty results are not cached so a later registration
    /// is still picked up.
    pub fn resolve(&self, service: TypeId, ancestor: GenericAncestor) -> Arc<[TypeWitness]> {
        if let Some(hit) = self.bindings.get(&(service, ancestor)) {
            return Arc::clone(hit.value());
        }

        let Some(descriptor) = self.descriptor(service) else {
            return Arc::from(Vec::new());
        };

        let Some(computed) = descriptor.binding(ancestor).map(Arc::<[TypeWitness]>::from) else {
            return Arc::from(Vec::new());
        };

        // Publish if absent; a concurrent resolver may have won the race
        Arc::clone(
            self.bindings
                .entry((service, ancestor))
                .or_insert(computed)
                .value(),
        )
    }

    pub fn resolve_for<S: ?Sized + 'static>(&self, ancestor: GenericAncestor) -> Arc<[TypeWitness]> {
        self.resolve(TypeId::of::<S>(), ancestor)
    }

    pub fn registered_services(&self) -> usize {
        self.descriptors.len()
    }

    pub fn cached_bindings(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_witness_equality() {
        assert_eq!(TypeWitness::of::<i64>(), TypeWitness::of::<i64>());
        assert_ne!(TypeWitness::of::<i64>(), TypeWitness::of::<u64>());
        assert!(TypeWitness::of::<String>().is::<String>());
        assert_eq!(TypeWitness::of::<u32>().to_string(), "u32");
    }

    #[test]
    fn test_unknown_service_resolves_empty() {
        let registry = TypeRegistry::new();
        let bound = registry.resolve_for::<String>(GenericAncestor::EntityService);
        assert!(bound.is_empty());
        assert_eq!(registry.cached_bindings(), 0);
    }

    #[allow(dead_code)]
    struct Widgets;
    #[allow(dead_code)]
    struct WidgetState;

    fn widget_descriptor(bindings: Vec<(GenericAncestor, Vec<TypeWitness>)>) -> ServiceDescriptor {
        ServiceDescriptor {
            service: TypeWitness::of::<Widgets>(),
            bindings,
        }
    }

    fn root_binding() -> (GenericAncestor, Vec<TypeWitness>) {
        (
            GenericAncestor::EntityService,
            vec![TypeWitness::of::<i64>(), TypeWitness::of::<String>()],
        )
    }

    fn state_binding() -> (GenericAncestor, Vec<TypeWitness>) {
        (
            GenericAncestor::StateEntityService,
            vec![
                TypeWitness::of::<i64>(),
                TypeWitness::of::<WidgetState>(),
                TypeWitness::of::<String>(),
            ],
        )
    }

    #[test]
    fn test_reregistration_adds_missing_ancestors() {
        let registry = TypeRegistry::new();
        registry.register(widget_descriptor(vec![root_binding()]));

        let root = registry.resolve_for::<Widgets>(GenericAncestor::EntityService);
        assert!(registry
            .resolve_for::<Widgets>(GenericAncestor::StateEntityService)
            .is_empty());
        assert_eq!(registry.cached_bindings(), 1);

        let merged = registry.register(widget_descriptor(vec![state_binding(), root_binding()]));
        assert_eq!(registry.registered_services(), 1);
        assert_eq!(merged.ancestors().count(), 2);

        let state = registry.resolve_for::<Widgets>(GenericAncestor::StateEntityService);
        assert_eq!(state.to_vec(), state_binding().1);
        assert!(Arc::ptr_eq(
            &root,
            &registry.resolve_for::<Widgets>(GenericAncestor::EntityService)
        ));

        // Same ancestry again leaves the stored descriptor alone
        let again = registry.register(widget_descriptor(vec![root_binding()]));
        assert!(Arc::ptr_eq(&merged, &again));
    }

    #[test]
    fn test_concurrent_resolves_share_one_cached_binding() {
        let registry = TypeRegistry::new();
        registry.register(widget_descriptor(vec![state_binding(), root_binding()]));

        let resolved: Vec<Arc<[TypeWitness]>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        registry.resolve_for::<Widgets>(GenericAncestor::StateEntityService)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(resolved.len(), 8);
        assert!(resolved.iter().all(|bound| Arc::ptr_eq(bound, &resolved[0])));
        assert_eq!(resolved[0].to_vec(), state_binding().1);
        assert_eq!(registry.cached_bindings(), 1);
    }
}
