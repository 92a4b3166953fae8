use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Join kind requested when a predicate field crosses an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    /// Tokens accepted as a trailing join tag in a condition key
    pub const TOKENS: [&'static str; 3] = ["INNER", "LEFT", "RIGHT"];

    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
        }
    }

    /// Whether a root row survives when the association is absent
    pub fn keeps_unmatched_root(&self) -> bool {
        matches!(self, JoinKind::Left)
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for JoinKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INNER" => Ok(Self::Inner),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            _ => Err(format!("Invalid join kind: {s}")),
        }
    }
}

/// An association an entity declares so dotted fields can be joined
///
/// `local_column` lives on the owning table, `foreign_column` on `table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub table: &'static str,
    pub local_column: &'static str,
    pub foreign_column: &'static str,
}

impl Association {
    pub const fn new(
        table: &'static str,
        local_column: &'static str,
        foreign_column: &'static str,
    ) -> Self {
        Self {
            table,
            local_column,
            foreign_column,
        }
    }
}

/// A rendered JOIN clause for one association hop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub alias: String,
    pub association: Association,
}

impl Join {
    pub fn new(kind: JoinKind, alias: &str, association: Association) -> Self {
        Self {
            kind,
            alias: alias.to_string(),
            association,
        }
    }

    /// Convert to SQL string, joined against the root alias
    pub fn to_sql(&self, root_alias: &str) -> String {
        format!(
            "{} \"{}\" AS \"{}\" ON \"{}\".\"{}\" = \"{}\".\"{}\"",
            self.kind.to_sql(),
            self.association.table,
            self.alias,
            self.alias,
            self.association.foreign_column,
            root_alias,
            self.association.local_column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_kind_tokens() {
        assert_eq!("LEFT".parse::<JoinKind>().unwrap(), JoinKind::Left);
        assert!("left".parse::<JoinKind>().is_err());
        assert_eq!(JoinKind::Right.to_string(), "RIGHT");
        assert!(JoinKind::Left.keeps_unmatched_root());
        assert!(!JoinKind::Inner.keeps_unmatched_root());
    }

    #[test]
    fn test_inner_join() {
        let join = Join::new(
            JoinKind::Inner,
            "customer",
            Association::new("customers", "customer_id", "id"),
        );
        assert_eq!(
            join.to_sql("t"),
            "INNER JOIN \"customers\" AS \"customer\" ON \"customer\".\"id\" = \"t\".\"customer_id\""
        );
    }

    #[test]
    fn test_left_join() {
        let join = Join::new(
            JoinKind::Left,
            "owner",
            Association::new("users", "owner_id", "user_id"),
        );
        assert!(join.to_sql("t").starts_with("LEFT JOIN \"users\""));
    }
}
