//! Filter objects to filter groups
//!
//! A filter object is parsed into a boolean tree where attribute constraints
//! and `_children` sub-filters are siblings under the object's join. The tree
//! is then normalized into an AND of ORs and emitted as [`FilterGroup`]s.
//! OR nodes that still contain nested nodes after normalization are refused
//! with [`FilterError::UnsupportedShape`]; no distribution is attempted.

use async_graphql::Value as ConstValue;
use tracing::debug;

use crate::catalog::{EntityCatalog, EntityDefinition, ScalarKind};
use crate::error::{FilterError, Result};

use super::{AnyAll, Condition, Constraint, FilterGroup, Operand, Operator, describe_groups};

/// Reserved key holding the join mode.
pub const JOIN_KEY: &str = "_join";
/// Reserved key holding nested filter objects.
pub const CHILDREN_KEY: &str = "_children";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    And,
    Or,
}

impl From<AnyAll> for Join {
    fn from(value: AnyAll) -> Self {
        match value {
            AnyAll::Any => Join::Or,
            AnyAll::All => Join::And,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Leaf(Constraint),
    Node(Node),
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    join: Join,
    children: Vec<Term>,
}

/// Compiles client filter objects against the catalog.
#[derive(Debug, Clone, Copy)]
pub struct FilterCompiler<'a> {
    catalog: &'a EntityCatalog,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(catalog: &'a EntityCatalog) -> Self {
        Self { catalog }
    }

    /// Compile an `{Entity}Filter` value. A null filter yields no groups.
    pub fn compile(&self, entity: &EntityDefinition, filter: &ConstValue) -> Result<Vec<FilterGroup>> {
        if matches!(filter, ConstValue::Null) {
            return Ok(Vec::new());
        }

        let root = self.parse_object(entity, filter, "")?;
        let groups = normalize(root)?;
        debug!(
            entity = entity.name(),
            groups = groups.len(),
            filter = %describe_groups(&groups),
            "Compiled filter"
        );
        Ok(groups)
    }

    /// Compile a scalar filter (`StringFilter`, ...) applied to list elements.
    pub fn compile_scalar(
        &self,
        kind: ScalarKind,
        filter: &ConstValue,
    ) -> std::result::Result<Vec<FilterGroup>, FilterError> {
        if matches!(filter, ConstValue::Null) {
            return Ok(Vec::new());
        }
        let constraint = parse_constraint(kind, "", filter)?;
        Ok(vec![FilterGroup::new(vec![constraint])])
    }

    fn parse_object(
        &self,
        entity: &EntityDefinition,
        value: &ConstValue,
        prefix: &str,
    ) -> Result<Node> {
        let ConstValue::Object(object) = value else {
            return Err(FilterError::NotAnObject {
                entity: entity.name().to_string(),
            }
            .into());
        };

        let mut join = AnyAll::default();
        let mut children = Vec::new();

        for (key, value) in object {
            match key.as_str() {
                JOIN_KEY => join = parse_join(value)?,
                CHILDREN_KEY => {
                    let items = match value {
                        ConstValue::Null => continue,
                        ConstValue::List(items) => items.as_slice(),
                        // A single object coerces to a one-element list.
                        ConstValue::Object(_) => std::slice::from_ref(value),
                        _ => return Err(FilterError::InvalidChildren.into()),
                    };
                    for item in items {
                        if !matches!(item, ConstValue::Object(_)) {
                            return Err(FilterError::InvalidChildren.into());
                        }
                        children.push(Term::Node(self.parse_object(entity, item, prefix)?));
                    }
                }
                name => {
                    let path = format!("{prefix}{name}");
                    let attribute =
                        entity
                            .attribute(name)
                            .ok_or_else(|| FilterError::UnknownAttribute {
                                entity: entity.name().to_string(),
                                field: path.clone(),
                            })?;
                    if matches!(value, ConstValue::Null) {
                        continue;
                    }
                    match attribute.scalar_kind() {
                        Some(kind) => children.push(Term::Leaf(parse_constraint(kind, &path, value)?)),
                        None => {
                            let target = self.catalog.require(attribute.type_name())?;
                            let node = self.parse_object(target, value, &format!("{path}."))?;
                            if !attribute.is_repeating() {
                                children.push(Term::Node(node));
                            } else if let Some(term) = per_element(node)? {
                                children.push(term);
                            }
                        }
                    }
                }
            }
        }

        Ok(Node {
            join: join.into(),
            children,
        })
    }
}

fn parse_join(value: &ConstValue) -> std::result::Result<AnyAll, FilterError> {
    let parsed = match value {
        ConstValue::Null => Some(AnyAll::default()),
        ConstValue::Enum(name) => AnyAll::from_name(name.as_str()),
        ConstValue::String(name) => AnyAll::from_name(name),
        _ => None,
    };
    parsed.ok_or_else(|| FilterError::InvalidJoin {
        found: value.to_string(),
    })
}

/// Parse `{op: operand}` (or `{from, to}`) for one scalar attribute.
fn parse_constraint(
    kind: ScalarKind,
    field: &str,
    value: &ConstValue,
) -> std::result::Result<Constraint, FilterError> {
    let ConstValue::Object(object) = value else {
        return Err(FilterError::NotAnObject {
            entity: field.to_string(),
        });
    };

    let operators = object
        .iter()
        .filter(|(_, operand)| !matches!(operand, ConstValue::Null))
        .map(|(key, operand)| {
            Operator::for_key(kind, key.as_str())
                .map(|op| (op, operand))
                .ok_or_else(|| FilterError::UnknownOperator {
                    field: field.to_string(),
                    operator: key.to_string(),
                })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let condition = match operators.as_slice() {
        [(Operator::From, from), (Operator::To, to)] | [(Operator::To, to), (Operator::From, from)] => {
            Condition::Range {
                from: operand(kind, field, Operator::From, from)?,
                to: operand(kind, field, Operator::To, to)?,
            }
        }
        [(Operator::From | Operator::To, _)] => {
            return Err(FilterError::IncompleteRange {
                field: field.to_string(),
            });
        }
        [(op, value)] => single_condition(kind, field, *op, value)?,
        _ => {
            return Err(FilterError::OperatorCount {
                field: field.to_string(),
                count: operators.len(),
            });
        }
    };

    Ok(Constraint::new(field, condition))
}

fn single_condition(
    kind: ScalarKind,
    field: &str,
    op: Operator,
    value: &ConstValue,
) -> std::result::Result<Condition, FilterError> {
    let text = || match value {
        ConstValue::String(s) => Ok(s.clone()),
        _ => Err(FilterError::InvalidOperand {
            field: field.to_string(),
            operator: op.key().to_string(),
            expected: "a String",
        }),
    };
    let flag = || match value {
        ConstValue::Boolean(b) => Ok(*b),
        _ => Err(FilterError::InvalidOperand {
            field: field.to_string(),
            operator: op.key().to_string(),
            expected: "a Boolean",
        }),
    };
    let list = || match value {
        ConstValue::List(items) => items
            .iter()
            .map(|item| operand(kind, field, op, item))
            .collect::<std::result::Result<Vec<_>, _>>(),
        single => Ok(vec![operand(kind, field, op, single)?]),
    };

    Ok(match op {
        Operator::Eq => Condition::Eq(operand(kind, field, op, value)?),
        Operator::Neq => Condition::Neq(operand(kind, field, op, value)?),
        Operator::Lt => Condition::Lt(operand(kind, field, op, value)?),
        Operator::Lteq => Condition::Lteq(operand(kind, field, op, value)?),
        Operator::Gt => Condition::Gt(operand(kind, field, op, value)?),
        Operator::Gteq => Condition::Gteq(operand(kind, field, op, value)?),
        Operator::Like => Condition::Like(text()?),
        Operator::FindInSet => Condition::FindInSet(text()?),
        Operator::In => Condition::In(list()?),
        Operator::Nin => Condition::Nin(list()?),
        Operator::Null if flag()? => Condition::Null,
        Operator::Null => Condition::NotNull,
        Operator::NotNull if flag()? => Condition::NotNull,
        Operator::NotNull => Condition::Null,
        Operator::From | Operator::To => {
            return Err(FilterError::IncompleteRange {
                field: field.to_string(),
            });
        }
    })
}

fn operand(
    kind: ScalarKind,
    field: &str,
    op: Operator,
    value: &ConstValue,
) -> std::result::Result<Operand, FilterError> {
    let parsed = match (kind, value) {
        (ScalarKind::String | ScalarKind::Id, ConstValue::String(s)) => Some(Operand::String(s.clone())),
        (ScalarKind::Id, ConstValue::Number(n)) if n.is_i64() || n.is_u64() => {
            Some(Operand::String(n.to_string()))
        }
        (ScalarKind::Int, ConstValue::Number(n)) => n.as_i64().map(Operand::Int),
        (ScalarKind::Float, ConstValue::Number(n)) => n.as_f64().map(Operand::Float),
        (ScalarKind::Boolean, ConstValue::Boolean(b)) => Some(Operand::Boolean(*b)),
        _ => None,
    };
    parsed.ok_or_else(|| FilterError::InvalidOperand {
        field: field.to_string(),
        operator: op.key().to_string(),
        expected: match kind {
            ScalarKind::String => "a String",
            ScalarKind::Int => "an Int",
            ScalarKind::Float => "a Float",
            ScalarKind::Id => "an ID",
            ScalarKind::Boolean => "a Boolean",
        },
    })
}

/// Dot-path constraints through a repeating attribute each hold when any one
/// element satisfies them. That only agrees with the filter when the
/// constraints are ORed, so an AND across elements is refused.
fn per_element(node: Node) -> std::result::Result<Option<Term>, FilterError> {
    match simplify(Term::Node(node)) {
        None => Ok(None),
        Some(Term::Leaf(constraint)) => Ok(Some(Term::Leaf(constraint))),
        Some(Term::Node(node))
            if node.join == Join::Or && node.children.iter().all(|child| matches!(child, Term::Leaf(_))) =>
        {
            Ok(Some(Term::Node(node)))
        }
        Some(Term::Node(_)) => Err(FilterError::UnsupportedShape),
    }
}

/// Drop empty nodes, collapse single-child nodes and splice children of
/// nested nodes that share their parent's join. An empty node matches
/// everything, so it absorbs an OR parent.
fn simplify(term: Term) -> Option<Term> {
    let node = match term {
        Term::Leaf(_) => return Some(term),
        Term::Node(node) => node,
    };

    let mut children = Vec::with_capacity(node.children.len());
    for child in node.children {
        match simplify(child) {
            None if node.join == Join::Or => return None,
            None => {}
            Some(Term::Node(inner)) if inner.join == node.join => children.extend(inner.children),
            Some(other) => children.push(other),
        }
    }

    match children.len() {
        0 => None,
        1 => children.pop(),
        _ => Some(Term::Node(Node {
            join: node.join,
            children,
        })),
    }
}

/// Reduce the tree to an AND of ORs and emit one group per OR.
fn normalize(root: Node) -> std::result::Result<Vec<FilterGroup>, FilterError> {
    let root = match simplify(Term::Node(root)) {
        None => return Ok(Vec::new()),
        Some(Term::Node(node)) if node.join == Join::And => node,
        Some(other) => Node {
            join: Join::And,
            children: vec![other],
        },
    };

    root.children
        .into_iter()
        .map(|child| match child {
            Term::Leaf(constraint) => Ok(FilterGroup::new(vec![constraint])),
            Term::Node(or) => or
                .children
                .into_iter()
                .map(|grandchild| match grandchild {
                    Term::Leaf(constraint) => Ok(constraint),
                    Term::Node(_) => Err(FilterError::UnsupportedShape),
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(FilterGroup::new),
        })
        .collect()
}
