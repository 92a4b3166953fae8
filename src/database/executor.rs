use crate::error::EntityResult;
use crate::models::Entity;
use crate::query_builder::Conditions;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// One open storage transaction
///
/// Writes become durable on [`UnitOfWork::commit`] and are discarded on
/// [`UnitOfWork::rollback`] or when the unit is dropped.
#[async_trait]
pub trait UnitOfWork<T: Entity>: Send {
    /// Rows matching `conditions`, ordered by id
    ///
    /// With `lock` the matched rows stay locked until the unit ends.
    async fn find(
        &mut self,
        conditions: &Conditions,
        limit: Option<usize>,
        lock: bool,
    ) -> EntityResult<Vec<T>>;

    /// Insert (assigning an id) or update (preserving it)
    async fn save(&mut self, entity: T) -> EntityResult<T>;

    /// Set one attribute on the row with `id`, returning rows affected
    ///
    /// With `only_if_changed` a row already holding `value` is left untouched
    /// and reports zero rows.
    async fn update_field(
        &mut self,
        id: &T::Id,
        field: &str,
        value: Value,
        only_if_changed: bool,
    ) -> EntityResult<u64>;

    fn set_rollback_only(&mut self);

    fn is_rollback_only(&self) -> bool;

    async fn commit(self: Box<Self>) -> EntityResult<()>;

    async fn rollback(self: Box<Self>) -> EntityResult<()>;
}

/// Storage collaborator able to open units of work for one entity type
#[async_trait]
pub trait QueryExecutor<T: Entity>: Send + Sync {
    async fn begin(&self) -> EntityResult<Box<dyn UnitOfWork<T>>>;
}

/// Mark the unit of work for rollback without raising
pub fn rollback<T: Entity>(uow: &mut dyn UnitOfWork<T>) {
    if !uow.is_rollback_only() {
        debug!(entity = T::TABLE, "Marking unit of work rollback-only");
    }
    uow.set_rollback_only();
}

/// End a unit of work according to the outcome of the work done in it
///
/// Commits on success, rolls back on error or when marked rollback-only. The
/// original error is returned even if the rollback itself fails.
pub async fn finish<T: Entity, R>(
    uow: Box<dyn UnitOfWork<T>>,
    result: EntityResult<R>,
) -> EntityResult<R> {
    match result {
        Ok(value) if uow.is_rollback_only() => {
            uow.rollback().await?;
            debug!(entity = T::TABLE, "Unit of work rolled back on request");
            Ok(value)
        }
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(
                    entity = T::TABLE,
                    error = %rollback_err,
                    "Rollback failed after error"
                );
            }
            Err(err)
        }
    }
}
