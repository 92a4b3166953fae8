use super::entity_service::EntityService;
use crate::database::{finish, UnitOfWork};
use crate::error::{EntityError, EntityResult};
use crate::logging::log_state_operation;
use crate::models::{Entity, StateEntity};
use crate::query_builder::Conditions;
use async_trait::async_trait;

/// State type bound by a [`StateEntityService`]
pub type StateOf<S> = <<S as EntityService>::Entity as StateEntity>::State;

/// Entity service over an entity with one mutable "current state"
#[async_trait]
pub trait StateEntityService: EntityService<Entity: StateEntity> {
    /// Write `next` as the current state of the entity with `id`
    ///
    /// Runs in its own unit of work. The store only writes when the stored
    /// value differs, so repeating the call reports zero rows. Any failure
    /// rolls the whole unit back.
    async fn update_state(&self, id: &Self::Id, next: StateOf<Self>) -> EntityResult<u64> {
        let mut uow = self.repository().executor().begin().await?;
        let result = self.update_state_in(&mut *uow, id, next).await;
        let rows = finish(uow, result).await?;
        log_state_operation(
            <Self::Entity as Entity>::TABLE,
            "update_state",
            &format!("{id:?}"),
            rows,
        );
        Ok(rows)
    }

    /// [`StateEntityService::update_state`] inside an open unit of work
    async fn update_state_in(
        &self,
        uow: &mut dyn UnitOfWork<Self::Entity>,
        id: &Self::Id,
        next: StateOf<Self>,
    ) -> EntityResult<u64> {
        let value = serde_json::to_value(&next)?;
        uow.update_field(
            id,
            <Self::Entity as StateEntity>::STATE_FIELD,
            value,
            true,
        )
        .await
    }

    /// Current state of the single entity matching `conditions`
    async fn current_state(&self, conditions: &Conditions) -> EntityResult<StateOf<Self>> {
        self.find_one(conditions, true)
            .await?
            .map(|entity| entity.state())
            .ok_or_else(|| EntityError::NotFound {
                entity: <Self::Entity as Entity>::TABLE.to_string(),
                conditions: conditions.to_string(),
            })
    }
}
