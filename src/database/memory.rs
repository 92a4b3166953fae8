//! # In-Memory Executor
//!
//! Thread-safe in-memory entity table for testing and development.
//!
//! ## Features
//!
//! - **Serializable units of work**: each unit holds the table lock from
//!   `begin` until commit or rollback, and works on a staged copy
//! - **Write counter**: [`InMemoryExecutor::write_count`] counts row writes
//!   that were actually committed
//! - **Failure injection**: [`InMemoryExecutor::fail_next_commit`] makes the
//!   next commit fail so rollback paths can be exercised
//!
//! Condition evaluation follows SQL semantics where it matters: comparisons
//! involving null are false, and a row whose declared association is absent
//! is dropped unless the association is joined `LEFT`. A `RIGHT` join cannot
//! produce extra root rows here and filters like `INNER`.
//!
//! Associations are read from the row's own serialized form: `customer.name`
//! walks into an embedded `customer` value rather than joining another table.

use super::executor::{QueryExecutor, UnitOfWork};
use crate::error::{configuration_error, transaction_failure, EntityError, EntityResult};
use crate::models::{Entity, EntityId};
use crate::query_builder::{ComparisonOperator, Conditions, JoinKind, Predicate};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

static NULL: Value = Value::Null;

#[derive(Debug, Clone)]
struct MemoryTable<T: Entity> {
    rows: BTreeMap<T::Id, T>,
    sequence: u64,
}

impl<T: Entity> MemoryTable<T> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            sequence: 0,
        }
    }

    /// Next unused id; fails once the id type is exhausted
    fn next_id(&mut self) -> EntityResult<T::Id> {
        let exhausted = || transaction_failure(format!("{} id sequence exhausted", T::TABLE));
        loop {
            self.sequence = self.sequence.checked_add(1).ok_or_else(exhausted)?;
            let candidate = T::Id::generate(self.sequence).ok_or_else(exhausted)?;
            if !self.rows.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
    }

    fn insert(&mut self, mut entity: T) -> EntityResult<T> {
        let id = match entity.id() {
            Some(id) => id,
            None => {
                let id = self.next_id()?;
                entity.set_id(id.clone());
                id
            }
        };
        self.rows.insert(id, entity.clone());
        Ok(entity)
    }
}

/// In-memory [`QueryExecutor`] for one entity type
pub struct InMemoryExecutor<T: Entity> {
    table: Arc<Mutex<MemoryTable<T>>>,
    writes: Arc<AtomicU64>,
    fail_next_commit: Arc<AtomicBool>,
}

impl<T: Entity> Clone for InMemoryExecutor<T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            writes: Arc::clone(&self.writes),
            fail_next_commit: Arc::clone(&self.fail_next_commit),
        }
    }
}

impl<T: Entity> Default for InMemoryExecutor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> InMemoryExecutor<T> {
    pub fn new() -> Self {
        Self::from_table(MemoryTable::new())
    }

    /// Seed the table; seeding does not count as writes
    pub fn with_rows(rows: Vec<T>) -> EntityResult<Self> {
        let mut table = MemoryTable::new();
        for row in rows {
            table.insert(row)?;
        }
        Ok(Self::from_table(table))
    }

    fn from_table(table: MemoryTable<T>) -> Self {
        Self {
            table: Arc::new(Mutex::new(table)),
            writes: Arc::new(AtomicU64::new(0)),
            fail_next_commit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Committed row writes since creation
    pub fn write_count(&self) -> u64 {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    /// Make the next commit fail and discard its staged writes
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, AtomicOrdering::SeqCst);
    }

    /// Committed rows, ordered by id
    pub async fn snapshot(&self) -> Vec<T> {
        self.table.lock().await.rows.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<T: Entity> QueryExecutor<T> for InMemoryExecutor<T> {
    async fn begin(&self) -> EntityResult<Box<dyn UnitOfWork<T>>> {
        let guard = Arc::clone(&self.table).lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            pending_writes: 0,
            rollback_only: false,
            writes: Arc::clone(&self.writes),
            fail_commit: Arc::clone(&self.fail_next_commit),
        }))
    }
}

struct MemoryUnitOfWork<T: Entity> {
    guard: OwnedMutexGuard<MemoryTable<T>>,
    staged: MemoryTable<T>,
    pending_writes: u64,
    rollback_only: bool,
    writes: Arc<AtomicU64>,
    fail_commit: Arc<AtomicBool>,
}

#[async_trait]
impl<T: Entity> UnitOfWork<T> for MemoryUnitOfWork<T> {
    async fn find(
        &mut self,
        conditions: &Conditions,
        limit: Option<usize>,
        _lock: bool,
    ) -> EntityResult<Vec<T>> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut found = Vec::new();
        for row in self.staged.rows.values() {
            if found.len() >= limit {
                break;
            }
            if matches_conditions::<T>(&serde_json::to_value(row)?, conditions)? {
                found.push(row.clone());
            }
        }
        Ok(found)
    }

    async fn save(&mut self, entity: T) -> EntityResult<T> {
        let saved = self.staged.insert(entity)?;
        self.pending_writes += 1;
        Ok(saved)
    }

    async fn update_field(
        &mut self,
        id: &T::Id,
        field: &str,
        value: Value,
        only_if_changed: bool,
    ) -> EntityResult<u64> {
        if !T::FIELDS.contains(&field) {
            return Err(EntityError::UnknownField {
                entity: T::TABLE.to_string(),
                field: field.to_string(),
            });
        }
        let Some(row) = self.staged.rows.get(id) else {
            return Ok(0);
        };

        let mut json = serde_json::to_value(row)?;
        let Some(object) = json.as_object_mut() else {
            return Err(configuration_error(format!(
                "{} does not serialize to a JSON object",
                T::TABLE
            )));
        };
        if only_if_changed && object.get(field) == Some(&value) {
            return Ok(0);
        }
        object.insert(field.to_string(), value);

        let updated: T = serde_json::from_value(json)?;
        self.staged.rows.insert(id.clone(), updated);
        self.pending_writes += 1;
        Ok(1)
    }

    fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    async fn commit(self: Box<Self>) -> EntityResult<()> {
        let MemoryUnitOfWork {
            mut guard,
            staged,
            pending_writes,
            writes,
            fail_commit,
            ..
        } = *self;

        if fail_commit.swap(false, AtomicOrdering::SeqCst) {
            return Err(transaction_failure(format!(
                "commit of {pending_writes} staged write(s) to {} failed",
                T::TABLE
            )));
        }

        *guard = staged;
        writes.fetch_add(pending_writes, AtomicOrdering::SeqCst);
        debug!(entity = T::TABLE, writes = pending_writes, "Committed unit of work");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> EntityResult<()> {
        debug!(
            entity = T::TABLE,
            discarded = self.pending_writes,
            "Rolled back unit of work"
        );
        Ok(())
    }
}

/// Fold predicates left to right by connector
///
/// Associations are joined first: a row whose association is absent is
/// dropped unless the association's first join tag is `LEFT`.
fn matches_conditions<T: Entity>(row: &Value, conditions: &Conditions) -> EntityResult<bool> {
    let mut joined: Vec<(&str, JoinKind)> = Vec::new();
    for predicate in conditions.iter() {
        let expression = &predicate.expression;
        let root = expression.root_segment();
        if expression.crosses_association()
            && T::association(root).is_some()
            && !joined.iter().any(|(name, _)| *name == root)
        {
            joined.push((root, expression.join_kind.unwrap_or(JoinKind::Inner)));
        }
    }
    for (association, kind) in joined {
        let absent = row.get(association).map_or(true, Value::is_null);
        if absent && !kind.keeps_unmatched_root() {
            return Ok(false);
        }
    }

    let mut acc: Option<bool> = None;
    for predicate in conditions.iter() {
        let outcome = evaluate(row, predicate)?;
        acc = Some(match acc {
            None => outcome,
            Some(prev) => predicate.expression.connector.combine(prev, outcome),
        });
    }
    Ok(acc.unwrap_or(true))
}

/// Value at a dotted path, null when any segment is missing
fn lookup<'a>(row: &'a Value, field: &str) -> &'a Value {
    field
        .split('.')
        .try_fold(row, |current, segment| current.get(segment))
        .unwrap_or(&NULL)
}

fn evaluate(row: &Value, predicate: &Predicate) -> EntityResult<bool> {
    let operator = predicate.expression.comparison()?;
    let actual = lookup(row, &predicate.expression.field);
    Ok(compare(actual, operator, &predicate.value))
}

fn compare(actual: &Value, operator: ComparisonOperator, expected: &Value) -> bool {
    match operator {
        ComparisonOperator::IsNull => actual.is_null(),
        ComparisonOperator::NotNull => !actual.is_null(),
        _ if actual.is_null() || expected.is_null() => false,
        ComparisonOperator::Eq => values_equal(actual, expected),
        ComparisonOperator::Ne => !values_equal(actual, expected),
        ComparisonOperator::Gt => order(actual, expected) == Some(Ordering::Greater),
        ComparisonOperator::Ge => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        ComparisonOperator::Lt => order(actual, expected) == Some(Ordering::Less),
        ComparisonOperator::Le => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        ComparisonOperator::Like => match (actual.as_str(), expected.as_str()) {
            (Some(text), Some(pattern)) => like(text, pattern),
            _ => false,
        },
        ComparisonOperator::In => match expected {
            Value::Array(candidates) => candidates.iter().any(|c| values_equal(actual, c)),
            single => values_equal(actual, single),
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match order(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL LIKE with `%` and `_` wildcards
fn like(text: &str, pattern: &str) -> bool {
    let mut translated = String::from("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated).is_ok_and(|re| re.is_match(text))
}
