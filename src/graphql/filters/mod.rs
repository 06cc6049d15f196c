//! Filter model shared by the compiler, the in-memory matcher and data sources
//!
//! A compiled filter is a list of [`FilterGroup`]s. Groups are ANDed together
//! and the constraints inside one group are ORed, the usual search-criteria
//! convention of storefront search APIs.

mod compile;
mod matcher;

use std::fmt;

use crate::catalog::ScalarKind;

pub use compile::{FilterCompiler, JOIN_KEY, CHILDREN_KEY};
pub use matcher::FilterMatcher;

/// Comparison operators accepted inside an attribute constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lteq,
    Gt,
    Gteq,
    Like,
    In,
    Nin,
    Null,
    NotNull,
    FindInSet,
    From,
    To,
}

const STRING_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::Lt,
    Operator::Lteq,
    Operator::Gt,
    Operator::Gteq,
    Operator::Like,
    Operator::In,
    Operator::Nin,
    Operator::Null,
    Operator::NotNull,
    Operator::FindInSet,
    Operator::From,
    Operator::To,
];

const NUMBER_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::Lt,
    Operator::Lteq,
    Operator::Gt,
    Operator::Gteq,
    Operator::In,
    Operator::Nin,
    Operator::Null,
    Operator::NotNull,
    Operator::From,
    Operator::To,
];

const ID_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::In,
    Operator::Nin,
    Operator::Null,
    Operator::NotNull,
];

const BOOLEAN_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::Null,
    Operator::NotNull,
];

impl Operator {
    /// Key used in filter objects.
    pub fn key(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Lt => "lt",
            Operator::Lteq => "lteq",
            Operator::Gt => "gt",
            Operator::Gteq => "gteq",
            Operator::Like => "like",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Null => "null",
            Operator::NotNull => "notnull",
            Operator::FindInSet => "finset",
            Operator::From => "from",
            Operator::To => "to",
        }
    }

    /// The operator vocabulary of one scalar type.
    pub fn vocabulary(kind: ScalarKind) -> &'static [Operator] {
        match kind {
            ScalarKind::String => STRING_OPERATORS,
            ScalarKind::Int | ScalarKind::Float => NUMBER_OPERATORS,
            ScalarKind::Id => ID_OPERATORS,
            ScalarKind::Boolean => BOOLEAN_OPERATORS,
        }
    }

    /// Look up `key` in the vocabulary of `kind`.
    pub fn for_key(kind: ScalarKind, key: &str) -> Option<Operator> {
        Self::vocabulary(kind)
            .iter()
            .copied()
            .find(|op| op.key() == key)
    }

    /// Operand type as rendered in SDL.
    pub fn operand_type(&self, kind: ScalarKind) -> String {
        match self {
            Operator::In | Operator::Nin => format!("[{kind}!]"),
            Operator::Null | Operator::NotNull => "Boolean".to_string(),
            Operator::Like | Operator::FindInSet => "String".to_string(),
            _ => kind.to_string(),
        }
    }
}

/// Name of the filter input type of a scalar.
pub fn scalar_filter_name(kind: ScalarKind) -> String {
    format!("{kind}Filter")
}

/// Join mode of a filter object's `_join` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnyAll {
    Any,
    #[default]
    All,
}

impl AnyAll {
    pub const TYPE_NAME: &'static str = "AnyAll";

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ANY" => Some(AnyAll::Any),
            "ALL" => Some(AnyAll::All),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnyAll::Any => "ANY",
            AnyAll::All => "ALL",
        }
    }
}

/// Literal operand of a constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Boolean(b) => write!(f, "{b}"),
            Operand::Int(i) => write!(f, "{i}"),
            Operand::Float(x) => write!(f, "{x}"),
            Operand::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// What a constraint checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Operand),
    Neq(Operand),
    Lt(Operand),
    Lteq(Operand),
    Gt(Operand),
    Gteq(Operand),
    Like(String),
    In(Vec<Operand>),
    Nin(Vec<Operand>),
    Null,
    NotNull,
    FindInSet(String),
    Range { from: Operand, to: Operand },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |items: &[Operand]| {
            items
                .iter()
                .map(Operand::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Condition::Eq(v) => write!(f, "= {v}"),
            Condition::Neq(v) => write!(f, "!= {v}"),
            Condition::Lt(v) => write!(f, "< {v}"),
            Condition::Lteq(v) => write!(f, "<= {v}"),
            Condition::Gt(v) => write!(f, "> {v}"),
            Condition::Gteq(v) => write!(f, ">= {v}"),
            Condition::Like(p) => write!(f, "like {p:?}"),
            Condition::In(items) => write!(f, "in ({})", list(items)),
            Condition::Nin(items) => write!(f, "not in ({})", list(items)),
            Condition::Null => f.write_str("is null"),
            Condition::NotNull => f.write_str("is not null"),
            Condition::FindInSet(v) => write!(f, "finset {v:?}"),
            Condition::Range { from, to } => write!(f, "between {from} and {to}"),
        }
    }
}

/// One atomic check. `field` is a dot path for attributes of nested
/// entities; an empty path targets the value itself (scalar list elements).
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub field: String,
    pub condition: Condition,
}

impl Constraint {
    pub fn new(field: impl Into<String>, condition: Condition) -> Self {
        Self {
            field: field.into(),
            condition,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "value {}", self.condition)
        } else {
            write!(f, "{} {}", self.field, self.condition)
        }
    }
}

/// Constraints ORed together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterGroup {
    pub constraints: Vec<Constraint>,
}

impl FilterGroup {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }
}

impl fmt::Display for FilterGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.constraints.iter().map(ToString::to_string).collect();
        write!(f, "({})", parts.join(" OR "))
    }
}

/// Render compiled groups for logs, e.g. `(sku = "a" OR sku = "b") AND (price > 10)`.
pub fn describe_groups(groups: &[FilterGroup]) -> String {
    groups
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" AND ")
}
