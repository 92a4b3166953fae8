//! # Condition Keys
//!
//! Parsing of compact condition keys into [`PredicateExpression`]s, and the
//! [`Conditions`] list that pairs each expression with an operand value.
//!
//! A condition key follows the single-line grammar
//!
//! ```text
//! [(OR|AND)@]FIELD[@OPERATOR][@(INNER|LEFT|RIGHT)]
//! ```
//!
//! - `FIELD` is a dotted path of word segments and is mandatory
//! - `OPERATOR` is any run of characters other than `@` that is not a join
//!   token; when absent the predicate compares for equality
//! - the connector defaults to `AND`
//! - the trailing join tag applies when `FIELD` crosses an association
//!
//! The whole key must match; trailing garbage is rejected.
//!
//! ```rust
//! use entity_state_core::query_builder::{parse, Connector, JoinKind};
//!
//! let expr = parse("OR@customer.name@like@LEFT").unwrap();
//! assert_eq!(expr.field, "customer.name");
//! assert_eq!(expr.operator.as_deref(), Some("like"));
//! assert_eq!(expr.connector, Connector::Or);
//! assert_eq!(expr.join_kind, Some(JoinKind::Left));
//! ```

use super::joins::JoinKind;
use crate::error::{malformed_predicate, EntityError, EntityResult};
use crate::models::Entity;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static CONDITION_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(OR|AND)@)?(\w+(?:\.\w+)*)(?:@([^@]+))?(?:@(INNER|LEFT|RIGHT))?$")
        .expect("condition grammar is a valid pattern")
});

/// Logical connector joining a predicate to the ones before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    pub fn token(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }

    /// Fold a predicate result into an accumulated result
    pub fn combine(&self, acc: bool, next: bool) -> bool {
        match self {
            Connector::And => acc && next,
            Connector::Or => acc || next,
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Structured form of one condition key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredicateExpression {
    /// Dotted field path, never empty
    pub field: String,
    /// Raw operator text; `None` means equality
    pub operator: Option<String>,
    pub connector: Connector,
    pub join_kind: Option<JoinKind>,
}

impl PredicateExpression {
    /// Equality predicate on `field`, AND-connected
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: None,
            connector: Connector::And,
            join_kind: None,
        }
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_join(mut self, join_kind: JoinKind) -> Self {
        self.join_kind = Some(join_kind);
        self
    }

    /// Path segments of the field
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.field.split('.')
    }

    /// First path segment: a declared field or an association name
    pub fn root_segment(&self) -> &str {
        self.field.split('.').next().unwrap_or(&self.field)
    }

    pub fn crosses_association(&self) -> bool {
        self.field.contains('.')
    }

    /// Interpret the operator text
    pub fn comparison(&self) -> EntityResult<ComparisonOperator> {
        ComparisonOperator::parse(self.operator.as_deref()).ok_or_else(|| {
            EntityError::UnsupportedOperator {
                key: self.to_string(),
                operator: self.operator.clone().unwrap_or_default(),
            }
        })
    }
}

impl fmt::Display for PredicateExpression {
    /// Canonical key form, which reparses to the same expression
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.connector, self.field)?;
        if let Some(operator) = &self.operator {
            write!(f, "@{operator}")?;
        }
        if let Some(join_kind) = &self.join_kind {
            write!(f, "@{join_kind}")?;
        }
        Ok(())
    }
}

impl FromStr for PredicateExpression {
    type Err = EntityError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        parse(key)
    }
}

/// Parse a condition key into a [`PredicateExpression`]
pub fn parse(key: &str) -> EntityResult<PredicateExpression> {
    let captures = CONDITION_GRAMMAR
        .captures(key)
        .ok_or_else(|| malformed_predicate(key, "no isolable field"))?;

    let field = captures
        .get(2)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| malformed_predicate(key, "no isolable field"))?;

    let connector = match captures.get(1).map(|m| m.as_str()) {
        Some("OR") => Connector::Or,
        _ => Connector::And,
    };

    let mut operator = captures.get(3).map(|m| m.as_str().to_string());
    let mut join_kind = captures
        .get(4)
        .map(|m| m.as_str().parse::<JoinKind>())
        .transpose()
        .map_err(|e| malformed_predicate(key, e))?;

    // `field@INNER` carries a join tag in the operator slot
    if let Some(op) = operator.as_deref() {
        if let Ok(kind) = op.parse::<JoinKind>() {
            if join_kind.is_some() {
                return Err(malformed_predicate(
                    key,
                    format!("operator may not be the join token {op}"),
                ));
            }
            join_kind = Some(kind);
            operator = None;
        }
    }

    Ok(PredicateExpression {
        field,
        operator,
        connector,
        join_kind,
    })
}

/// Comparison understood by the bundled executors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    In,
    IsNull,
    NotNull,
}

impl ComparisonOperator {
    /// Interpret operator text; `None` is equality
    pub fn parse(operator: Option<&str>) -> Option<Self> {
        let Some(op) = operator else {
            return Some(Self::Eq);
        };
        let op = op.trim().to_ascii_lowercase();
        let parsed = match op.as_str() {
            "=" | "==" | "eq" => Self::Eq,
            "!=" | "<>" | "ne" => Self::Ne,
            ">" | "gt" => Self::Gt,
            ">=" | "ge" => Self::Ge,
            "<" | "lt" => Self::Lt,
            "<=" | "le" => Self::Le,
            "like" => Self::Like,
            "in" => Self::In,
            "null" | "is_null" => Self::IsNull,
            "not_null" => Self::NotNull,
            _ => return None,
        };
        Some(parsed)
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::IsNull => "IS NULL",
            Self::NotNull => "IS NOT NULL",
        }
    }

    /// Whether the operand value is ignored
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::IsNull | Self::NotNull)
    }
}

/// A parsed expression paired with its operand
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub expression: PredicateExpression,
    pub value: Value,
}

impl Predicate {
    pub fn new(expression: PredicateExpression, value: Value) -> Self {
        Self { expression, value }
    }
}

/// Ordered predicate list, folded left to right by connector
///
/// The connector of the first predicate is ignored. An empty list matches
/// every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    predicates: Vec<Predicate>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate from a condition key
    pub fn with(mut self, key: &str, value: impl Serialize) -> EntityResult<Self> {
        let expression = parse(key)?;
        self.predicates
            .push(Predicate::new(expression, serde_json::to_value(value)?));
        Ok(self)
    }

    /// Add an already-structured predicate
    pub fn push(&mut self, expression: PredicateExpression, value: Value) {
        self.predicates.push(Predicate::new(expression, value));
    }

    /// Single equality predicate on `field`
    pub fn eq(field: &str, value: impl Serialize) -> EntityResult<Self> {
        Self::new().with(field, value)
    }

    /// Build from a map of condition keys to operands, in the map's order
    pub fn from_map(map: &serde_json::Map<String, Value>) -> EntityResult<Self> {
        let mut conditions = Self::new();
        for (key, value) in map {
            conditions.push(parse(key)?, value.clone());
        }
        Ok(conditions)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Check every predicate against the declared fields of `T`
    ///
    /// A dotted path must start at a declared association or at a declared
    /// field holding a nested value. Operators are checked as well.
    pub fn validate_for<T: Entity>(&self) -> EntityResult<()> {
        for predicate in &self.predicates {
            let expression = &predicate.expression;
            let root = expression.root_segment();
            let declared = T::FIELDS.contains(&root);
            let associated = expression.crosses_association() && T::association(root).is_some();
            if !declared && !associated {
                return Err(EntityError::UnknownField {
                    entity: T::TABLE.to_string(),
                    field: expression.field.clone(),
                });
            }
            expression.comparison()?;
        }
        Ok(())
    }
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return f.write_str("<all>");
        }
        let rendered: Vec<String> = self
            .predicates
            .iter()
            .map(|p| format!("{}={}", p.expression, p.value))
            .collect();
        f.write_str(&rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_field() {
        let expr = parse("name").unwrap();
        assert_eq!(expr.field, "name");
        assert_eq!(expr.operator, None);
        assert_eq!(expr.connector, Connector::And);
        assert_eq!(expr.join_kind, None);
    }

    #[test]
    fn test_connector_and_operator() {
        let expr = parse("OR@age@>").unwrap();
        assert_eq!(expr.field, "age");
        assert_eq!(expr.operator.as_deref(), Some(">"));
        assert_eq!(expr.connector, Connector::Or);
        assert_eq!(expr.join_kind, None);
    }

    #[test]
    fn test_full_key() {
        let expr = parse("AND@name@=@INNER").unwrap();
        assert_eq!(expr.field, "name");
        assert_eq!(expr.operator.as_deref(), Some("="));
        assert_eq!(expr.connector, Connector::And);
        assert_eq!(expr.join_kind, Some(JoinKind::Inner));
    }

    #[test]
    fn test_join_without_operator() {
        let expr = parse("customer.name@RIGHT").unwrap();
        assert_eq!(expr.field, "customer.name");
        assert_eq!(expr.operator, None);
        assert_eq!(expr.join_kind, Some(JoinKind::Right));
        assert!(expr.crosses_association());
        assert_eq!(expr.root_segment(), "customer");
    }

    #[test]
    fn test_malformed_keys() {
        for key in ["", "@>", "OR@", "name@", "na me", "a@b@c@d", ".name", "name.", "a..b"] {
            let err = parse(key).unwrap_err();
            assert!(
                matches!(err, EntityError::MalformedPredicate { .. }),
                "expected malformed predicate for {key:?}"
            );
        }
    }

    #[test]
    fn test_operator_may_not_be_join_token() {
        assert!(parse("name@INNER@LEFT").is_err());
    }

    #[test]
    fn test_canonical_display() {
        let expr = parse("age@>=").unwrap();
        assert_eq!(expr.to_string(), "AND@age@>=");
        assert_eq!(parse(&expr.to_string()).unwrap(), expr);

        let expr = parse("OR@owner.id@LEFT").unwrap();
        assert_eq!(expr.to_string(), "OR@owner.id@LEFT");
    }

    #[test]
    fn test_comparison_operator() {
        assert_eq!(
            ComparisonOperator::parse(None),
            Some(ComparisonOperator::Eq)
        );
        assert_eq!(
            ComparisonOperator::parse(Some("<>")),
            Some(ComparisonOperator::Ne)
        );
        assert_eq!(
            ComparisonOperator::parse(Some("LIKE")),
            Some(ComparisonOperator::Like)
        );
        assert_eq!(ComparisonOperator::parse(Some("~~")), None);

        let expr = parse("name@~~").unwrap();
        assert!(matches!(
            expr.comparison(),
            Err(EntityError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_conditions_builder() {
        let conditions = Conditions::new()
            .with("name", "widget")
            .unwrap()
            .with("OR@quantity@>", 3)
            .unwrap();
        assert_eq!(conditions.len(), 2);
        assert_eq!(
            conditions.to_string(),
            "AND@name=\"widget\", OR@quantity@>=3"
        );
        assert_eq!(Conditions::new().to_string(), "<all>");
    }

    #[test]
    fn test_conditions_from_map() {
        let map = serde_json::json!({"status@!=": "closed"});
        let conditions = Conditions::from_map(map.as_object().unwrap()).unwrap();
        let predicate = conditions.iter().next().unwrap();
        assert_eq!(predicate.expression.field, "status");
        assert_eq!(predicate.value, serde_json::json!("closed"));

        let bad = serde_json::json!({"@": 1});
        assert!(Conditions::from_map(bad.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_conditions_from_map_keeps_key_order() {
        let map = serde_json::json!({"reference": "A-101", "OR@total@>": 200});
        let conditions = Conditions::from_map(map.as_object().unwrap()).unwrap();
        let fields: Vec<&str> = conditions
            .iter()
            .map(|p| p.expression.field.as_str())
            .collect();
        assert_eq!(fields, vec!["reference", "total"]);
        assert_eq!(
            conditions.to_string(),
            "AND@reference=\"A-101\", OR@total@>=200"
        );
    }
}
