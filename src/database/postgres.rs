use super::executor::{QueryExecutor, UnitOfWork};
use crate::error::EntityResult;
use crate::models::Entity;
use crate::query_builder::builder::{select_query, update_field_query, upsert_query};
use crate::query_builder::Conditions;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use std::marker::PhantomData;
use tracing::debug;

/// PostgreSQL-backed [`QueryExecutor`] for one entity type
pub struct PgExecutor<T> {
    pool: PgPool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for PgExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> PgExecutor<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> EntityResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl<T: Entity> QueryExecutor<T> for PgExecutor<T> {
    async fn begin(&self) -> EntityResult<Box<dyn UnitOfWork<T>>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork::<T> {
            tx,
            rollback_only: false,
            _entity: PhantomData,
        }))
    }
}

struct PgUnitOfWork<T> {
    tx: Transaction<'static, Postgres>,
    rollback_only: bool,
    _entity: PhantomData<fn() -> T>,
}

fn decode_row<T: Entity>(row: &PgRow) -> EntityResult<T> {
    let Json(value): Json<Value> = row.try_get("row")?;
    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl<T: Entity> UnitOfWork<T> for PgUnitOfWork<T> {
    async fn find(
        &mut self,
        conditions: &Conditions,
        limit: Option<usize>,
        lock: bool,
    ) -> EntityResult<Vec<T>> {
        let mut query = select_query::<T>(conditions, limit, lock)?;
        debug!(entity = T::TABLE, sql = query.sql(), "Executing select");
        let rows = query.build().fetch_all(&mut *self.tx).await?;
        rows.iter().map(decode_row::<T>).collect()
    }

    async fn save(&mut self, entity: T) -> EntityResult<T> {
        let mut query = upsert_query(&entity)?;
        let row = query.build().fetch_optional(&mut *self.tx).await?;
        match row {
            Some(row) => decode_row(&row),
            // Nothing to update beyond the id itself
            None => Ok(entity),
        }
    }

    async fn update_field(
        &mut self,
        id: &T::Id,
        field: &str,
        value: Value,
        only_if_changed: bool,
    ) -> EntityResult<u64> {
        let mut query = update_field_query::<T>(id, field, value, only_if_changed)?;
        let result = query.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    async fn commit(self: Box<Self>) -> EntityResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> EntityResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
