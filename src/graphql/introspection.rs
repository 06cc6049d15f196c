//! Introspection schema
//!
//! Mirrors the compiled types as an async-graphql dynamic schema so that
//! `__schema` and `__type` can be answered, e.g. for GraphiQL. The field
//! resolvers return nothing: operations selecting entity fields are run by
//! the executor and never reach this schema.

use async_graphql::Value as ConstValue;
use async_graphql::dynamic::{
    Enum, Field, FieldFuture, FieldValue, InputObject, InputValue, Object, Schema, TypeRef,
};
use tracing::debug;

use crate::catalog::ScalarKind;
use crate::error::SchemaError;

use super::filters::{AnyAll, CHILDREN_KEY, JOIN_KEY};
use super::pagination::PageDefaults;
use super::registry::{Argument, TypeRegistry};
use super::roots::{OperationKind, RootFields};
use super::sdl::Reachable;
use super::wrapping::TypeString;

/// Root fields answered by the introspection schema.
pub fn is_introspection_field(name: &str) -> bool {
    matches!(name, "__schema" | "__type")
}

pub fn build_introspection_schema(
    registry: &TypeRegistry,
    roots: &RootFields,
    pages: PageDefaults,
) -> Result<Schema, SchemaError> {
    let reachable = Reachable::collect(registry, roots)?;
    let has_mutations = roots.fields(OperationKind::Mutation).next().is_some();
    let mut builder = Schema::build(
        OperationKind::Query.type_name(),
        has_mutations.then(|| OperationKind::Mutation.type_name()),
        None,
    );

    for kind in [OperationKind::Query, OperationKind::Mutation] {
        let mut root = Object::new(kind.type_name());
        let mut empty = true;
        for field in roots.fields(kind) {
            let output = arguments(placeholder(field.name(), &field.return_type()), &field.arguments(pages));
            root = root.field(described(output, field.description()));
            empty = false;
        }
        if !empty {
            builder = builder.register(root);
        }
    }

    for object in reachable.objects.values() {
        let mut ty = Object::new(object.name());
        let description = object.definition().description();
        if !description.is_empty() {
            ty = ty.description(description);
        }
        for field in object.fields(registry)?.values() {
            let output = arguments(placeholder(field.name(), field.ty()), field.arguments());
            ty = ty.field(described(output, field.attribute().description()));
        }
        builder = builder.register(ty);
    }

    for input in reachable.inputs.values() {
        let mut ty = InputObject::new(input.name());
        for field in input.fields(registry)?.values() {
            ty = ty.field(InputValue::new(field.name(), type_ref(field.ty())));
        }
        builder = builder.register(ty);
    }

    for filter in reachable.filters.values() {
        let mut ty = InputObject::new(filter.name())
            .field(InputValue::new(JOIN_KEY, TypeRef::named(AnyAll::TYPE_NAME)))
            .field(InputValue::new(CHILDREN_KEY, TypeRef::named_nn_list(filter.name())));
        for field in filter.fields(registry)?.values() {
            ty = ty.field(InputValue::new(field.name(), TypeRef::named(field.target().type_name())));
        }
        builder = builder.register(ty);
    }

    for kind in ScalarKind::ALL {
        let scalar = registry.scalar_filter(kind);
        let mut ty = InputObject::new(scalar.name());
        for operator in scalar.operators() {
            let operand = TypeString::parse(&operator.operand_type(kind))?;
            ty = ty.field(InputValue::new(operator.key(), type_ref(&operand)));
        }
        builder = builder.register(ty);
    }

    builder = builder.register(
        Enum::new(AnyAll::TYPE_NAME)
            .item(AnyAll::Any.name())
            .item(AnyAll::All.name()),
    );

    let schema = builder.finish().map_err(|e| SchemaError::Introspection {
        reason: e.to_string(),
    })?;
    debug!(objects = reachable.objects.len(), "Built introspection schema");
    Ok(schema)
}

/// Dynamic type reference for a type string.
pub fn type_ref(ty: &TypeString) -> TypeRef {
    let name = ty.name().to_string();
    match (ty.is_list(), ty.is_element_non_null(), ty.is_non_null()) {
        (false, _, false) => TypeRef::named(name),
        (false, _, true) => TypeRef::named_nn(name),
        (true, false, false) => TypeRef::named_list(name),
        (true, true, false) => TypeRef::named_nn_list(name),
        (true, false, true) => TypeRef::named_list_nn(name),
        (true, true, true) => TypeRef::named_nn_list_nn(name),
    }
}

fn placeholder(name: &str, ty: &TypeString) -> Field {
    Field::new(name, type_ref(ty), |_| FieldFuture::new(async { Ok(FieldValue::NONE) }))
}

fn described(field: Field, description: &str) -> Field {
    if description.is_empty() { field } else { field.description(description) }
}

fn arguments(mut field: Field, arguments: &[Argument]) -> Field {
    for argument in arguments {
        let mut input = InputValue::new(&argument.name, type_ref(&argument.ty));
        if let Some(default) = argument.default.as_deref().and_then(default_value) {
            input = input.default_value(default);
        }
        field = field.argument(input);
    }
    field
}

fn default_value(text: &str) -> Option<ConstValue> {
    serde_json::from_str(text).ok().and_then(|json| ConstValue::from_json(json).ok())
}
