//! Entity and attribute descriptors
//!
//! Both descriptors are immutable once built. Each attribute carries its own
//! accessor so that reading a value never depends on the name of a method on
//! the record type.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::value::{AttributeValue, Record};

/// Reads a stored attribute from a record, `None` when the record has no such field.
pub type Accessor = Arc<dyn Fn(&dyn Record) -> Option<AttributeValue> + Send + Sync>;

/// Derives an attribute value from the whole record.
pub type ComputeFn = Arc<dyn Fn(&dyn Record) -> AttributeValue + Send + Sync>;

/// Built-in scalar tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Id,
    Boolean,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 5] = [
        ScalarKind::String,
        ScalarKind::Int,
        ScalarKind::Float,
        ScalarKind::Id,
        ScalarKind::Boolean,
    ];

    /// Parse a scalar tag, `None` for anything else (entity names).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "String" => Some(ScalarKind::String),
            "Int" => Some(ScalarKind::Int),
            "Float" => Some(ScalarKind::Float),
            "ID" => Some(ScalarKind::Id),
            "Boolean" => Some(ScalarKind::Boolean),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::Id => "ID",
            ScalarKind::Boolean => "Boolean",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Describes one attribute of an entity.
#[derive(Clone)]
pub struct AttributeDefinition {
    name: String,
    description: String,
    type_name: String,
    repeating: bool,
    nullable: bool,
    accessor: Accessor,
    compute: Option<ComputeFn>,
}

impl AttributeDefinition {
    /// A single scalar value.
    pub fn scalar(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ScalarKind,
        nullable: bool,
    ) -> Self {
        Self::new(name.into(), description.into(), kind.name().to_string(), false, nullable)
    }

    /// A reference to another entity. Repeating attributes are never null,
    /// absence is an empty list.
    pub fn entity(
        name: impl Into<String>,
        description: impl Into<String>,
        entity_name: impl Into<String>,
        repeating: bool,
        nullable: bool,
    ) -> Self {
        Self::new(
            name.into(),
            description.into(),
            entity_name.into(),
            repeating,
            nullable && !repeating,
        )
    }

    fn new(
        name: String,
        description: String,
        type_name: String,
        repeating: bool,
        nullable: bool,
    ) -> Self {
        let key = name.clone();
        Self {
            name,
            description,
            type_name,
            repeating,
            nullable,
            accessor: Arc::new(move |record: &dyn Record| record.core(&key)),
            compute: None,
        }
    }

    /// Turn a scalar attribute into a list of that scalar.
    pub fn repeated(mut self) -> Self {
        self.repeating = true;
        self.nullable = false;
        self
    }

    /// Back the attribute by a function of the record instead of a stored field.
    pub fn computed<F>(mut self, compute: F) -> Self
    where
        F: Fn(&dyn Record) -> AttributeValue + Send + Sync + 'static,
    {
        self.compute = Some(Arc::new(compute));
        self
    }

    /// Replace the default core accessor (a keyed lookup by attribute name).
    pub fn with_accessor<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&dyn Record) -> Option<AttributeValue> + Send + Sync + 'static,
    {
        self.accessor = Arc::new(accessor);
        self
    }

    /// Typed accessor for a concrete record type; other record types read as absent.
    pub fn with_typed_accessor<R, F>(self, accessor: F) -> Self
    where
        R: Record,
        F: Fn(&R) -> Option<AttributeValue> + Send + Sync + 'static,
    {
        self.with_accessor(move |record: &dyn Record| {
            record.as_any().downcast_ref::<R>().and_then(&accessor)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Scalar tag or entity name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_repeating(&self) -> bool {
        self.repeating
    }

    /// Only meaningful for non-repeating attributes.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_computed(&self) -> bool {
        self.compute.is_some()
    }

    pub fn is_scalar(&self) -> bool {
        self.scalar_kind().is_some()
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        ScalarKind::from_name(&self.type_name)
    }

    pub(crate) fn compute(&self, record: &dyn Record) -> Option<AttributeValue> {
        self.compute.as_ref().map(|f| f(record))
    }

    pub(crate) fn read_core(&self, record: &dyn Record) -> Option<AttributeValue> {
        (self.accessor)(record)
    }
}

impl fmt::Debug for AttributeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDefinition")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("repeating", &self.repeating)
            .field("nullable", &self.nullable)
            .field("computed", &self.is_computed())
            .finish()
    }
}

/// A named record type and its attributes.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    name: String,
    description: String,
    attributes: IndexMap<String, Arc<AttributeDefinition>>,
}

impl EntityDefinition {
    /// A later attribute with the same name replaces an earlier one.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        attributes: impl IntoIterator<Item = AttributeDefinition>,
    ) -> Self {
        let attributes = attributes
            .into_iter()
            .map(|attribute| (attribute.name.clone(), Arc::new(attribute)))
            .collect();
        Self {
            name: name.into(),
            description: description.into(),
            attributes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<AttributeDefinition>> {
        self.attributes.get(name)
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &Arc<AttributeDefinition>> {
        self.attributes.values()
    }

    /// Append attributes whose names are not declared yet.
    pub(crate) fn extend_missing(&mut self, extra: impl IntoIterator<Item = AttributeDefinition>) {
        for attribute in extra {
            if !self.attributes.contains_key(attribute.name()) {
                self.attributes
                    .insert(attribute.name.clone(), Arc::new(attribute));
            }
        }
    }
}
