//! # Entity Context
//!
//! Service-construction context. Owns the configuration and the type
//! registry, and is the only way to obtain an [`EntityRepository`].
//!
//! Building a repository registers the service's [`ServiceDescriptor`],
//! resolves its binding through the registry and checks the entity's
//! metadata. Any mismatch is a configuration error raised at construction,
//! before the service handles a single call.

use crate::config::EntityConfig;
use crate::database::QueryExecutor;
use crate::error::{configuration_error, EntityResult};
use crate::models::{Entity, StateEntity, StateRecord};
use crate::registry::{
    GenericAncestor, MethodRegistry, ServiceDescriptor, TypeRegistry, TypeWitness,
};
use crate::services::{EntityRepository, EntityService, StateEntityService, StateRecordEntityService};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct EntityContext {
    config: Arc<EntityConfig>,
    types: Arc<TypeRegistry>,
}

impl Default for EntityContext {
    fn default() -> Self {
        Self::from_valid(EntityConfig::default())
    }
}

impl EntityContext {
    /// Context over `config`, which is validated first
    pub fn new(config: EntityConfig) -> EntityResult<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: EntityConfig) -> Self {
        Self {
            config: Arc::new(config),
            types: Arc::new(TypeRegistry::new()),
        }
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Repository for a plain entity service
    pub fn repository<S: EntityService>(
        &self,
        executor: Arc<dyn QueryExecutor<S::Entity>>,
    ) -> EntityResult<EntityRepository<S::Entity>> {
        self.build::<S>(
            ServiceDescriptor::entity_service::<S>(),
            GenericAncestor::EntityService,
            &[TypeWitness::of::<S::Id>(), TypeWitness::of::<S::Entity>()],
            executor,
        )
    }

    /// Repository for a state entity service
    pub fn state_repository<S: StateEntityService>(
        &self,
        executor: Arc<dyn QueryExecutor<S::Entity>>,
    ) -> EntityResult<EntityRepository<S::Entity>> {
        let state_field = <S::Entity as StateEntity>::STATE_FIELD;
        if !<S::Entity as Entity>::FIELDS.contains(&state_field) {
            return Err(configuration_error(format!(
                "{}: state field '{state_field}' is not a declared field",
                <S::Entity as Entity>::TABLE
            )));
        }
        self.build::<S>(
            ServiceDescriptor::state_entity_service::<S>(),
            GenericAncestor::StateEntityService,
            &[
                TypeWitness::of::<S::Id>(),
                TypeWitness::of::<<S::Entity as StateEntity>::State>(),
                TypeWitness::of::<S::Entity>(),
            ],
            executor,
        )
    }

    /// Repository for a transition record service
    pub fn record_repository<S: StateRecordEntityService>(
        &self,
        executor: Arc<dyn QueryExecutor<S::Entity>>,
    ) -> EntityResult<EntityRepository<S::Entity>> {
        let subject_field = <S::Entity as StateRecord>::SUBJECT_FIELD;
        if !<S::Entity as Entity>::FIELDS.contains(&subject_field) {
            return Err(configuration_error(format!(
                "{}: subject field '{subject_field}' is not a declared field",
                <S::Entity as Entity>::TABLE
            )));
        }
        self.build::<S>(
            ServiceDescriptor::state_record_service::<S>(),
            GenericAncestor::StateRecordEntityService,
            &[
                TypeWitness::of::<<S::Entity as StateRecord>::SubjectId>(),
                TypeWitness::of::<<S::Entity as StateRecord>::State>(),
                TypeWitness::of::<S::Entity>(),
            ],
            executor,
        )
    }

    fn build<S: EntityService>(
        &self,
        descriptor: ServiceDescriptor,
        ancestor: GenericAncestor,
        expected: &[TypeWitness],
        executor: Arc<dyn QueryExecutor<S::Entity>>,
    ) -> EntityResult<EntityRepository<S::Entity>> {
        let service = TypeWitness::of::<S>();
        Self::validate_metadata::<S::Entity>()?;

        self.types.register(descriptor);
        let binding = self.types.resolve_for::<S>(ancestor);
        if binding.is_empty() {
            return Err(configuration_error(format!(
                "{service} does not bind type arguments on {ancestor}"
            )));
        }
        if &*binding != expected {
            return Err(configuration_error(format!(
                "{service} is bound to {} on {ancestor}, expected {}",
                render(&binding),
                render(expected)
            )));
        }

        let mutators = Arc::new(MethodRegistry::<S::Entity>::for_entity()?);
        info!(
            service = %service,
            ancestor = %ancestor,
            binding = %render(&binding),
            mutators = mutators.len(),
            "Built entity repository"
        );

        Ok(EntityRepository::new(
            executor,
            mutators,
            service,
            binding,
            self.config.query.max_results,
            self.config.persistence.lock_for_update,
        ))
    }

    fn validate_metadata<T: Entity>() -> EntityResult<()> {
        if T::TABLE.trim().is_empty() {
            return Err(configuration_error(format!(
                "{} declares a blank table name",
                TypeWitness::of::<T>()
            )));
        }
        if !T::FIELDS.contains(&T::ID_FIELD) {
            return Err(configuration_error(format!(
                "{}: id field '{}' is not a declared field",
                T::TABLE,
                T::ID_FIELD
            )));
        }
        Ok(())
    }
}

fn render(witnesses: &[TypeWitness]) -> String {
    let names: Vec<&str> = witnesses.iter().map(TypeWitness::type_name).collect();
    format!("({})", names.join(", "))
}
