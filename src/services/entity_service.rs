use crate::database::{finish, QueryExecutor, UnitOfWork};
use crate::error::{EntityError, EntityResult};
use crate::models::{Entity, EntityId};
use crate::query_builder::Conditions;
use crate::registry::{MethodRegistry, TypeWitness};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Shared state behind every concrete entity service
///
/// Built only by [`crate::EntityContext`], which checks the service's type
/// binding and the entity's metadata first.
pub struct EntityRepository<T: Entity> {
    executor: Arc<dyn QueryExecutor<T>>,
    mutators: Arc<MethodRegistry<T>>,
    service: TypeWitness,
    binding: Arc<[TypeWitness]>,
    max_results: usize,
    lock_for_update: bool,
}

impl<T: Entity> EntityRepository<T> {
    pub(crate) fn new(
        executor: Arc<dyn QueryExecutor<T>>,
        mutators: Arc<MethodRegistry<T>>,
        service: TypeWitness,
        binding: Arc<[TypeWitness]>,
        max_results: usize,
        lock_for_update: bool,
    ) -> Self {
        Self {
            executor,
            mutators,
            service,
            binding,
            max_results,
            lock_for_update,
        }
    }

    pub fn executor(&self) -> &dyn QueryExecutor<T> {
        self.executor.as_ref()
    }

    pub fn mutators(&self) -> &MethodRegistry<T> {
        &self.mutators
    }

    /// The concrete service this repository was built for
    pub fn service(&self) -> TypeWitness {
        self.service
    }

    /// Type arguments the service binds, as resolved at construction
    pub fn binding(&self) -> &[TypeWitness] {
        &self.binding
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Whether state writes lock the row they read
    pub fn lock_for_update(&self) -> bool {
        self.lock_for_update
    }
}

impl<T: Entity> fmt::Debug for EntityRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRepository")
            .field("entity", &T::TABLE)
            .field("service", &self.service)
            .field("binding", &self.binding)
            .field("max_results", &self.max_results)
            .field("lock_for_update", &self.lock_for_update)
            .finish()
    }
}

/// Generic CRUD over an (Id, Entity) pair
///
/// Implementors only hand out their [`EntityRepository`]; every operation is
/// provided. Conditions are validated against the entity's declared fields
/// before they reach the store.
#[async_trait]
pub trait EntityService: Send + Sync + 'static {
    type Id: EntityId;
    type Entity: Entity<Id = Self::Id>;

    fn repository(&self) -> &EntityRepository<Self::Entity>;

    /// First row matching `conditions`, ordered by id
    ///
    /// Fails with [`EntityError::NotFound`] when `required` and nothing
    /// matches.
    async fn find_one(
        &self,
        conditions: &Conditions,
        required: bool,
    ) -> EntityResult<Option<Self::Entity>> {
        let mut uow = self.repository().executor().begin().await?;
        let result = self.find_one_in(&mut *uow, conditions, required, false).await;
        finish(uow, result).await
    }

    /// [`EntityService::find_one`] inside an open unit of work
    async fn find_one_in(
        &self,
        uow: &mut dyn UnitOfWork<Self::Entity>,
        conditions: &Conditions,
        required: bool,
        lock: bool,
    ) -> EntityResult<Option<Self::Entity>> {
        conditions.validate_for::<Self::Entity>()?;
        let mut rows = uow.find(conditions, Some(1), lock).await?;
        match rows.pop() {
            Some(entity) => Ok(Some(entity)),
            None if required => Err(EntityError::NotFound {
                entity: <Self::Entity as Entity>::TABLE.to_string(),
                conditions: conditions.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Every matching row, up to the configured maximum
    async fn find_all(&self, conditions: &Conditions) -> EntityResult<Vec<Self::Entity>> {
        conditions.validate_for::<Self::Entity>()?;
        let limit = self.repository().max_results();
        let mut uow = self.repository().executor().begin().await?;
        let result = uow.find(conditions, Some(limit), false).await;
        finish(uow, result).await
    }

    async fn find_by_id(&self, id: &Self::Id) -> EntityResult<Option<Self::Entity>> {
        let conditions = Conditions::eq(<Self::Entity as Entity>::ID_FIELD, id)?;
        self.find_one(&conditions, false).await
    }

    /// Insert (assigning an id) or update (preserving it)
    async fn save(&self, entity: Self::Entity) -> EntityResult<Self::Entity> {
        let mut uow = self.repository().executor().begin().await?;
        let result = uow.save(entity).await;
        let saved = finish(uow, result).await?;
        debug!(
            entity = <Self::Entity as Entity>::TABLE,
            id = ?saved.id(),
            "Saved entity"
        );
        Ok(saved)
    }

    /// Apply named mutators to the entity with `id` and save it
    ///
    /// Each key of `patch` names a mutator from the entity's method registry
    /// and each value is its argument. Nothing is saved unless every mutator
    /// applies cleanly.
    async fn apply_mutations(
        &self,
        id: &Self::Id,
        patch: &Map<String, Value>,
    ) -> EntityResult<Self::Entity> {
        let repository = self.repository();
        let conditions = Conditions::eq(<Self::Entity as Entity>::ID_FIELD, id)?;

        let mut uow = repository.executor().begin().await?;
        let result = async {
            let mut entity = self
                .find_one_in(&mut *uow, &conditions, true, repository.lock_for_update())
                .await?
                .ok_or_else(|| EntityError::NotFound {
                    entity: <Self::Entity as Entity>::TABLE.to_string(),
                    conditions: conditions.to_string(),
                })?;

            for (name, argument) in patch {
                let handle = repository.mutators().get(name).ok_or_else(|| {
                    EntityError::UnknownMutator {
                        entity: <Self::Entity as Entity>::TABLE.to_string(),
                        name: name.clone(),
                    }
                })?;
                handle.invoke(&mut entity, argument.clone())?;
            }

            uow.save(entity).await
        }
        .await;
        finish(uow, result).await
    }
}
