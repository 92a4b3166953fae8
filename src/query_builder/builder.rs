//! # Statement Builder
//!
//! Renders [`Conditions`] and entity writes into parameterized PostgreSQL
//! statements.
//!
//! Rows travel as JSON: selects return `to_jsonb("t".*)` and writes go
//! through `jsonb_populate_record`, so any serde entity whose declared
//! fields match its table's columns can be stored without per-type SQL.
//!
//! Predicates compare `jsonb` values, which keeps operand binding uniform:
//!
//! ```text
//! AND@total@>           to_jsonb("t"."total") > $1
//! AND@customer.name     to_jsonb("customer"."name") = $2      (INNER JOIN)
//! AND@payload.kind      NULLIF(to_jsonb("t"."payload") #> $3, 'null') = $4
//! AND@note@like         ("t"."note")::text LIKE $5
//! ```

use super::conditions::{ComparisonOperator, Conditions, Connector, Predicate};
use super::joins::{Join, JoinKind};
use crate::error::{EntityError, EntityResult};
use crate::models::Entity;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

/// Alias of the entity's own table in every statement
pub const ROOT_ALIAS: &str = "t";

/// Alias of the populated record in write statements
pub const RECORD_ALIAS: &str = "rec";

/// Quote a (possibly dotted) identifier
pub fn quote_ident(identifier: &str) -> String {
    identifier
        .split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Where a predicate's field lives once joins are resolved
#[derive(Debug, Clone, PartialEq)]
struct ColumnPath {
    alias: String,
    column: String,
    /// JSON path below the column
    path: Vec<String>,
}

impl ColumnPath {
    fn column_sql(&self) -> String {
        format!("{}.{}", quote_ident(&self.alias), quote_ident(&self.column))
    }
}

fn resolve_column<T: Entity>(field: &str) -> EntityResult<ColumnPath> {
    let segments: Vec<&str> = field.split('.').collect();
    match segments.as_slice() {
        [column] if T::FIELDS.contains(column) => Ok(ColumnPath {
            alias: ROOT_ALIAS.to_string(),
            column: column.to_string(),
            path: Vec::new(),
        }),
        [root, column, rest @ ..] if T::association(root).is_some() => Ok(ColumnPath {
            alias: root.to_string(),
            column: column.to_string(),
            path: rest.iter().map(|s| s.to_string()).collect(),
        }),
        [root, rest @ ..] if T::FIELDS.contains(root) => Ok(ColumnPath {
            alias: ROOT_ALIAS.to_string(),
            column: root.to_string(),
            path: rest.iter().map(|s| s.to_string()).collect(),
        }),
        _ => Err(EntityError::UnknownField {
            entity: T::TABLE.to_string(),
            field: field.to_string(),
        }),
    }
}

/// Joins required by `conditions`, one per association, first tag wins
fn plan_joins<T: Entity>(conditions: &Conditions, lock: bool) -> Vec<Join> {
    let mut joins: Vec<Join> = Vec::new();
    for predicate in conditions.iter() {
        let expression = &predicate.expression;
        if !expression.crosses_association() {
            continue;
        }
        let root = expression.root_segment();
        let Some(association) = T::association(root) else {
            continue;
        };

        let mut kind = expression.join_kind.unwrap_or(JoinKind::Inner);
        // Row locks cannot reach the nullable side of an outer join; for
        // root-row filtering RIGHT narrows exactly like INNER
        if lock && kind == JoinKind::Right {
            kind = JoinKind::Inner;
        }

        match joins.iter_mut().find(|join| join.alias == root) {
            Some(existing) if expression.join_kind.is_some() && existing.kind != kind => {
                debug!(
                    entity = T::TABLE,
                    association = root,
                    kept = %existing.kind,
                    ignored = %kind,
                    "Conflicting join tags; keeping the first"
                );
            }
            Some(_) => {}
            None => joins.push(Join::new(kind, root, association)),
        }
    }
    joins
}

fn push_predicate(
    builder: &mut QueryBuilder<'static, Postgres>,
    column: &ColumnPath,
    predicate: &Predicate,
) -> EntityResult<()> {
    let operator = predicate.expression.comparison()?;
    let column_sql = column.column_sql();
    let value = &predicate.value;

    let push_json_expr = |builder: &mut QueryBuilder<'static, Postgres>| {
        if column.path.is_empty() {
            builder.push(format!("to_jsonb({column_sql})"));
        } else {
            builder.push(format!("NULLIF(to_jsonb({column_sql}) #> "));
            builder.push_bind(column.path.clone());
            builder.push(", 'null')");
        }
    };

    match operator {
        ComparisonOperator::IsNull | ComparisonOperator::NotNull => {
            if column.path.is_empty() {
                builder.push(format!("{column_sql} {}", operator.to_sql()));
            } else {
                builder.push("(");
                push_json_expr(builder);
                builder.push(format!(") {}", operator.to_sql()));
            }
        }
        _ if value.is_null() => {
            builder.push("FALSE");
        }
        ComparisonOperator::Like => {
            let pattern = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            if column.path.is_empty() {
                builder.push(format!("({column_sql})::text LIKE "));
            } else {
                builder.push(format!("(to_jsonb({column_sql}) #>> "));
                builder.push_bind(column.path.clone());
                builder.push(") LIKE ");
            }
            builder.push_bind(pattern);
        }
        ComparisonOperator::In => {
            let candidates = match value {
                Value::Array(_) => value.clone(),
                single => Value::Array(vec![single.clone()]),
            };
            push_json_expr(builder);
            builder.push(" IN (SELECT jsonb_array_elements(");
            builder.push_bind(Json(candidates));
            builder.push("))");
        }
        _ => {
            push_json_expr(builder);
            builder.push(format!(" {} ", operator.to_sql()));
            builder.push_bind(Json(value.clone()));
        }
    }
    Ok(())
}

/// `SELECT` returning matching rows as JSON, ordered by id
pub fn select_query<T: Entity>(
    conditions: &Conditions,
    limit: Option<usize>,
    lock: bool,
) -> EntityResult<QueryBuilder<'static, Postgres>> {
    let joins = plan_joins::<T>(conditions, lock);
    let root = quote_ident(ROOT_ALIAS);
    let id_column = format!("{root}.{}", quote_ident(T::ID_FIELD));

    let mut builder = QueryBuilder::new(format!(
        "SELECT to_jsonb({root}.*) AS \"row\" FROM {} AS {root}",
        quote_ident(T::TABLE)
    ));
    for join in &joins {
        builder.push(" ");
        builder.push(join.to_sql(ROOT_ALIAS));
    }

    if !conditions.is_empty() {
        builder.push(" WHERE ");
        if !joins.is_empty() {
            builder.push(format!("{id_column} IS NOT NULL AND "));
        }
        builder.push("(".repeat(conditions.len()));
        for (index, predicate) in conditions.iter().enumerate() {
            if index > 0 {
                let connector = match predicate.expression.connector {
                    Connector::And => " AND ",
                    Connector::Or => " OR ",
                };
                builder.push(connector);
            }
            let column = resolve_column::<T>(&predicate.expression.field)?;
            push_predicate(&mut builder, &column, predicate)?;
            builder.push(")");
        }
    } else if !joins.is_empty() {
        builder.push(format!(" WHERE {id_column} IS NOT NULL"));
    }

    builder.push(format!(" ORDER BY {id_column}"));
    if let Some(limit) = limit {
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    if lock {
        builder.push(format!(" FOR UPDATE OF {root}"));
    }
    Ok(builder)
}

/// Insert-or-update of one entity, returning the stored row as JSON
///
/// An entity without an id is inserted without the id column so the table
/// default assigns it.
pub fn upsert_query<T: Entity>(entity: &T) -> EntityResult<QueryBuilder<'static, Postgres>> {
    let row = serde_json::to_value(entity)?;
    let inserting = entity.id().is_none();
    let columns: Vec<&str> = T::FIELDS
        .iter()
        .copied()
        .filter(|field| !(inserting && *field == T::ID_FIELD))
        .collect();

    let table = quote_ident(T::TABLE);
    let root = quote_ident(ROOT_ALIAS);
    let record = quote_ident(RECORD_ALIAS);
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let record_columns = columns
        .iter()
        .map(|c| format!("{record}.{}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {table} AS {root} ({column_list}) SELECT {record_columns} FROM jsonb_populate_record(NULL::{table}, "
    ));
    builder.push_bind(Json(row));
    builder.push(format!(") AS {record}"));

    if !inserting {
        let assignments = columns
            .iter()
            .filter(|c| **c != T::ID_FIELD)
            .map(|c| format!("{0} = EXCLUDED.{0}", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        builder.push(format!(" ON CONFLICT ({}) ", quote_ident(T::ID_FIELD)));
        if assignments.is_empty() {
            builder.push("DO NOTHING");
        } else {
            builder.push(format!("DO UPDATE SET {assignments}"));
        }
    }

    builder.push(format!(" RETURNING to_jsonb({root}.*) AS \"row\""));
    Ok(builder)
}

/// Single-attribute update keyed by id
///
/// With `only_if_changed` the row is left untouched when it already holds
/// the value, so the affected count reports whether a write happened.
pub fn update_field_query<T: Entity>(
    id: &T::Id,
    field: &str,
    value: Value,
    only_if_changed: bool,
) -> EntityResult<QueryBuilder<'static, Postgres>> {
    if !T::FIELDS.contains(&field) || field == T::ID_FIELD {
        return Err(EntityError::UnknownField {
            entity: T::TABLE.to_string(),
            field: field.to_string(),
        });
    }

    let mut record = serde_json::Map::new();
    record.insert(T::ID_FIELD.to_string(), serde_json::to_value(id)?);
    record.insert(field.to_string(), value);

    let table = quote_ident(T::TABLE);
    let root = quote_ident(ROOT_ALIAS);
    let rec = quote_ident(RECORD_ALIAS);
    let column = quote_ident(field);
    let id_column = quote_ident(T::ID_FIELD);

    let mut builder = QueryBuilder::new(format!(
        "UPDATE {table} AS {root} SET {column} = {rec}.{column} FROM jsonb_populate_record(NULL::{table}, "
    ));
    builder.push_bind(Json(Value::Object(record)));
    builder.push(format!(
        ") AS {rec} WHERE {root}.{id_column} = {rec}.{id_column}"
    ));
    if only_if_changed {
        builder.push(format!(
            " AND {root}.{column} IS DISTINCT FROM {rec}.{column}"
        ));
    }
    Ok(builder)
}
