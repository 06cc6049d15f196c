//! Compiled output, input and filter types
//!
//! The registry compiles catalog entities in two phases. Looking a type up
//! registers a handle for it under its entity name (a placeholder with no
//! fields). Field lists are computed the first time they are asked for and
//! only take handles of the types they reference, so entities that refer to
//! each other compile without recursion.
//!
//! Each cache is guarded by its own lock and an entry is inserted exactly
//! once, so every lookup of a name returns the same `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::catalog::{
    AttributeDefinition, AttributeValue, EntityCatalog, EntityDefinition, EntityValue, ScalarKind,
};
use crate::error::SchemaError;

use super::filters::{Operator, scalar_filter_name};
use super::wrapping::TypeString;

/// An argument accepted by an output or root field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub ty: TypeString,
    pub default: Option<String>,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: TypeString) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl ToString) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

/// What an output field resolves to.
#[derive(Debug, Clone)]
pub enum OutputTarget {
    Scalar(ScalarKind),
    Object(Arc<ObjectType>),
}

#[derive(Debug, Clone)]
pub struct OutputField {
    attribute: Arc<AttributeDefinition>,
    ty: TypeString,
    target: OutputTarget,
    arguments: Vec<Argument>,
}

impl OutputField {
    pub fn name(&self) -> &str {
        self.attribute.name()
    }

    pub fn attribute(&self) -> &Arc<AttributeDefinition> {
        &self.attribute
    }

    pub fn ty(&self) -> &TypeString {
        &self.ty
    }

    pub fn target(&self) -> &OutputTarget {
        &self.target
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn accepts(&self, argument: &str) -> bool {
        self.arguments.iter().any(|a| a.name == argument)
    }

    /// Read this field from a record.
    pub fn resolve(&self, value: EntityValue<'_>) -> Result<AttributeValue, SchemaError> {
        value.get_attribute(self.attribute.name())
    }
}

/// Output type of one entity.
pub struct ObjectType {
    definition: Arc<EntityDefinition>,
    fields: OnceCell<IndexMap<String, OutputField>>,
}

impl ObjectType {
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<EntityDefinition> {
        &self.definition
    }

    /// Compiled fields, computed on first access.
    pub fn fields(&self, registry: &TypeRegistry) -> Result<&IndexMap<String, OutputField>, SchemaError> {
        self.fields
            .get_or_try_init(|| registry.compile_output_fields(&self.definition))
    }

    pub fn field(&self, registry: &TypeRegistry, name: &str) -> Result<&OutputField, SchemaError> {
        self.fields(registry)?
            .get(name)
            .ok_or_else(|| SchemaError::UnknownAttribute {
                entity: self.name().to_string(),
                attribute: name.to_string(),
            })
    }
}

impl std::fmt::Debug for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectType")
            .field("name", &self.name())
            .field("compiled", &self.fields.get().is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum InputTarget {
    Scalar(ScalarKind),
    Object(Arc<InputObjectType>),
}

#[derive(Debug, Clone)]
pub struct InputField {
    attribute: Arc<AttributeDefinition>,
    ty: TypeString,
    target: InputTarget,
}

impl InputField {
    pub fn name(&self) -> &str {
        self.attribute.name()
    }

    pub fn attribute(&self) -> &Arc<AttributeDefinition> {
        &self.attribute
    }

    pub fn ty(&self) -> &TypeString {
        &self.ty
    }

    pub fn target(&self) -> &InputTarget {
        &self.target
    }
}

/// `{Entity}Input`: the settable attributes of an entity.
pub struct InputObjectType {
    name: String,
    definition: Arc<EntityDefinition>,
    fields: OnceCell<IndexMap<String, InputField>>,
}

impl InputObjectType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Arc<EntityDefinition> {
        &self.definition
    }

    /// Fails with [`SchemaError::NoInputFields`] when nothing is settable.
    pub fn fields(&self, registry: &TypeRegistry) -> Result<&IndexMap<String, InputField>, SchemaError> {
        self.fields
            .get_or_try_init(|| registry.compile_input_fields(&self.definition))
    }
}

impl std::fmt::Debug for InputObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputObjectType")
            .field("name", &self.name)
            .field("compiled", &self.fields.get().is_some())
            .finish()
    }
}

/// Filter type of one scalar, e.g. `IntFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarFilterType {
    kind: ScalarKind,
}

impl ScalarFilterType {
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn name(&self) -> String {
        scalar_filter_name(self.kind)
    }

    pub fn operators(&self) -> &'static [Operator] {
        Operator::vocabulary(self.kind)
    }
}

#[derive(Debug, Clone)]
pub enum FilterTarget {
    Scalar(ScalarFilterType),
    Entity(Arc<FilterType>),
}

impl FilterTarget {
    pub fn type_name(&self) -> String {
        match self {
            FilterTarget::Scalar(scalar) => scalar.name(),
            FilterTarget::Entity(filter) => filter.name().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterField {
    attribute: Arc<AttributeDefinition>,
    target: FilterTarget,
}

impl FilterField {
    pub fn name(&self) -> &str {
        self.attribute.name()
    }

    pub fn target(&self) -> &FilterTarget {
        &self.target
    }
}

/// `{Entity}Filter`: one sub-filter per attribute plus `_join`/`_children`.
pub struct FilterType {
    name: String,
    definition: Arc<EntityDefinition>,
    fields: OnceCell<IndexMap<String, FilterField>>,
}

impl FilterType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Arc<EntityDefinition> {
        &self.definition
    }

    pub fn fields(&self, registry: &TypeRegistry) -> Result<&IndexMap<String, FilterField>, SchemaError> {
        self.fields
            .get_or_try_init(|| registry.compile_filter_fields(&self.definition))
    }
}

impl std::fmt::Debug for FilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterType")
            .field("name", &self.name)
            .field("compiled", &self.fields.get().is_some())
            .finish()
    }
}

type Cache<T> = Mutex<HashMap<String, Arc<T>>>;

/// Process-wide type caches over one catalog.
pub struct TypeRegistry {
    catalog: Arc<EntityCatalog>,
    objects: Cache<ObjectType>,
    inputs: Cache<InputObjectType>,
    filters: Cache<FilterType>,
}

impl TypeRegistry {
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        Self {
            catalog,
            objects: Mutex::default(),
            inputs: Mutex::default(),
            filters: Mutex::default(),
        }
    }

    pub fn catalog(&self) -> &Arc<EntityCatalog> {
        &self.catalog
    }

    /// Output type handle for `entity`.
    pub fn object_type(&self, entity: &str) -> Result<Arc<ObjectType>, SchemaError> {
        self.cached(&self.objects, entity, |definition| ObjectType {
            definition,
            fields: OnceCell::new(),
        })
    }

    /// `{entity}Input` handle.
    pub fn input_type(&self, entity: &str) -> Result<Arc<InputObjectType>, SchemaError> {
        self.cached(&self.inputs, entity, |definition| InputObjectType {
            name: format!("{}Input", definition.name()),
            definition,
            fields: OnceCell::new(),
        })
    }

    /// `{entity}Filter` handle.
    pub fn filter_type(&self, entity: &str) -> Result<Arc<FilterType>, SchemaError> {
        self.cached(&self.filters, entity, |definition| FilterType {
            name: format!("{}Filter", definition.name()),
            definition,
            fields: OnceCell::new(),
        })
    }

    pub fn scalar_filter(&self, kind: ScalarKind) -> ScalarFilterType {
        ScalarFilterType { kind }
    }

    /// Compile every output and filter type in the catalog. Input types are
    /// left lazy because not every entity is meant to be settable.
    pub fn compile_all(&self) -> Result<(), SchemaError> {
        for name in self.catalog.names() {
            self.object_type(name)?.fields(self)?;
            self.filter_type(name)?.fields(self)?;
        }
        Ok(())
    }

    fn cached<T>(
        &self,
        cache: &Cache<T>,
        entity: &str,
        placeholder: impl FnOnce(Arc<EntityDefinition>) -> T,
    ) -> Result<Arc<T>, SchemaError> {
        let mut cache = cache.lock();
        if let Some(existing) = cache.get(entity) {
            return Ok(existing.clone());
        }
        let definition = self.catalog.require(entity)?.clone();
        let handle = Arc::new(placeholder(definition));
        cache.insert(entity.to_string(), handle.clone());
        Ok(handle)
    }

    fn compile_output_fields(
        &self,
        definition: &EntityDefinition,
    ) -> Result<IndexMap<String, OutputField>, SchemaError> {
        let mut fields = IndexMap::new();
        for attribute in definition.attributes() {
            let (target, filter_type) = match attribute.scalar_kind() {
                Some(kind) => (OutputTarget::Scalar(kind), scalar_filter_name(kind)),
                None => {
                    let object = self.object_type(attribute.type_name())?;
                    let filter = self.filter_type(attribute.type_name())?;
                    (OutputTarget::Object(object), filter.name().to_string())
                }
            };

            let mut arguments = Vec::new();
            if attribute.is_repeating() {
                arguments.push(Argument::new("start", TypeString::named("Int")).with_default(0));
                arguments.push(Argument::new("limit", TypeString::named("Int")));
            }
            if attribute.is_repeating() || !attribute.is_scalar() {
                arguments.push(Argument::new("filter", TypeString::named(filter_type)));
            }

            fields.insert(
                attribute.name().to_string(),
                OutputField {
                    attribute: attribute.clone(),
                    ty: TypeString::for_attribute(attribute),
                    target,
                    arguments,
                },
            );
        }
        debug!(entity = definition.name(), fields = fields.len(), "Compiled output type");
        Ok(fields)
    }

    fn compile_input_fields(
        &self,
        definition: &EntityDefinition,
    ) -> Result<IndexMap<String, InputField>, SchemaError> {
        let mut fields = IndexMap::new();
        for attribute in definition.attributes() {
            if attribute.scalar_kind() == Some(ScalarKind::Id) || attribute.is_computed() {
                continue;
            }
            let (target, type_name) = match attribute.scalar_kind() {
                Some(kind) => (InputTarget::Scalar(kind), kind.to_string()),
                None => {
                    let input = self.input_type(attribute.type_name())?;
                    let name = input.name().to_string();
                    (InputTarget::Object(input), name)
                }
            };
            let ty = if attribute.is_repeating() {
                TypeString::list_of(type_name)
            } else if attribute.is_nullable() {
                TypeString::named(type_name)
            } else {
                TypeString::named(type_name).non_null()
            };
            fields.insert(
                attribute.name().to_string(),
                InputField {
                    attribute: attribute.clone(),
                    ty,
                    target,
                },
            );
        }
        if fields.is_empty() {
            return Err(SchemaError::NoInputFields {
                entity: definition.name().to_string(),
            });
        }
        debug!(entity = definition.name(), fields = fields.len(), "Compiled input type");
        Ok(fields)
    }

    fn compile_filter_fields(
        &self,
        definition: &EntityDefinition,
    ) -> Result<IndexMap<String, FilterField>, SchemaError> {
        let mut fields = IndexMap::new();
        for attribute in definition.attributes() {
            let target = match attribute.scalar_kind() {
                Some(kind) => FilterTarget::Scalar(self.scalar_filter(kind)),
                None => FilterTarget::Entity(self.filter_type(attribute.type_name())?),
            };
            fields.insert(
                attribute.name().to_string(),
                FilterField {
                    attribute: attribute.clone(),
                    target,
                },
            );
        }
        debug!(entity = definition.name(), fields = fields.len(), "Compiled filter type");
        Ok(fields)
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("objects", &self.objects.lock().len())
            .field("inputs", &self.inputs.lock().len())
            .field("filters", &self.filters.lock().len())
            .finish()
    }
}
