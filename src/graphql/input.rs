//! Validation of input objects against compiled input types
//!
//! Valid input is returned as a JSON object with the same shape, ready to be
//! stored by a data source.

use async_graphql::Value as ConstValue;
use serde_json::{Map, Value};

use crate::catalog::ScalarKind;
use crate::error::{Error, Result};

use super::registry::{InputField, InputObjectType, InputTarget, TypeRegistry};

/// Validates values for one argument of one root field.
pub struct InputValidator<'a> {
    registry: &'a TypeRegistry,
    field: &'a str,
}

impl<'a> InputValidator<'a> {
    pub fn new(registry: &'a TypeRegistry, field: &'a str) -> Self {
        Self { registry, field }
    }

    /// Check `value` against `ty`; `path` names the argument in errors.
    pub fn validate(&self, ty: &InputObjectType, value: &ConstValue, path: &str) -> Result<Map<String, Value>> {
        let ConstValue::Object(object) = value else {
            return Err(self.invalid(path, format!("expected an object of type {}", ty.name())));
        };
        let fields = ty.fields(self.registry)?;

        if let Some(unknown) = object.keys().find(|key| !fields.contains_key(key.as_str())) {
            return Err(self.invalid(path, format!("unknown field '{unknown}' on {}", ty.name())));
        }

        let mut output = Map::new();
        for field in fields.values() {
            let field_path = format!("{path}.{}", field.name());
            match object.get(field.name()) {
                None | Some(ConstValue::Null) if field.ty().is_non_null() => {
                    return Err(self.invalid(&field_path, format!("missing required field of type {}", field.ty())));
                }
                None | Some(ConstValue::Null) => {}
                Some(value) => {
                    output.insert(field.name().to_string(), self.field_value(field, value, &field_path)?);
                }
            }
        }
        Ok(output)
    }

    fn field_value(&self, field: &InputField, value: &ConstValue, path: &str) -> Result<Value> {
        if !field.ty().is_list() {
            return self.element(field, value, path);
        }
        let items = match value {
            ConstValue::List(items) => items.as_slice(),
            single => std::slice::from_ref(single),
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let item_path = format!("{path}[{i}]");
                if matches!(item, ConstValue::Null) {
                    if field.ty().is_element_non_null() {
                        return Err(self.invalid(&item_path, "list elements can not be null".to_string()));
                    }
                    return Ok(Value::Null);
                }
                self.element(field, item, &item_path)
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    fn element(&self, field: &InputField, value: &ConstValue, path: &str) -> Result<Value> {
        match field.target() {
            InputTarget::Object(ty) => self.validate(ty, value, path).map(Value::Object),
            InputTarget::Scalar(kind) => {
                scalar(*kind, value).ok_or_else(|| self.invalid(path, format!("expected {kind}")))
            }
        }
    }

    fn invalid(&self, path: &str, reason: String) -> Error {
        Error::InvalidArgument {
            field: self.field.to_string(),
            argument: path.to_string(),
            reason,
        }
    }
}

/// Coerce a literal to the JSON representation of a scalar.
fn scalar(kind: ScalarKind, value: &ConstValue) -> Option<Value> {
    match (kind, value) {
        (ScalarKind::String, ConstValue::String(s)) => Some(Value::String(s.clone())),
        (ScalarKind::Id, ConstValue::String(s)) => Some(Value::String(s.clone())),
        (ScalarKind::Id, ConstValue::Number(n)) if n.is_i64() || n.is_u64() => Some(Value::String(n.to_string())),
        (ScalarKind::Int, ConstValue::Number(n)) => n.as_i64().map(Value::from),
        (ScalarKind::Float, ConstValue::Number(n)) => n.as_f64().map(Value::from),
        (ScalarKind::Boolean, ConstValue::Boolean(b)) => Some(Value::Bool(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::catalog::EntityCatalog;

    fn validate(value: serde_json::Value) -> Result<Map<String, Value>> {
        let registry = TypeRegistry::new(Arc::new(EntityCatalog::storefront().unwrap()));
        let order = registry.input_type("Order").unwrap();
        let value = ConstValue::from_json(value).unwrap();
        InputValidator::new(&registry, "placeOrder").validate(&order, &value, "order")
    }

    #[test]
    fn test_valid_order_input() {
        let output = validate(json!({
            "shippingMethod": "flatrate",
            "items": [ { "qty": 2 } ],
            "billingAddress": { "country": "FR", "city": "Paris", "street": "1 rue de Rivoli", "zip": "75001" }
        }))
        .unwrap();
        assert_eq!(
            Value::Object(output),
            json!({
                "items": [ { "qty": 2.0 } ],
                "billingAddress": { "country": "FR", "city": "Paris", "street": "1 rue de Rivoli", "zip": "75001" },
                "shippingMethod": "flatrate"
            })
        );
    }

    #[test]
    fn test_missing_required_field() {
        assert_matches!(
            validate(json!({ "items": [] })),
            Err(Error::InvalidArgument { argument, .. }) if argument == "order.shippingMethod"
        );
    }

    #[test]
    fn test_unknown_and_mistyped_fields() {
        assert_matches!(
            validate(json!({ "shippingMethod": "x", "id": "5" })),
            Err(Error::InvalidArgument { reason, .. }) if reason.contains("unknown field 'id'")
        );
        assert_matches!(
            validate(json!({ "shippingMethod": "x", "items": [ { "qty": "two" } ] })),
            Err(Error::InvalidArgument { argument, .. }) if argument == "order.items[0].qty"
        );
        assert_matches!(
            validate(json!("not an object")),
            Err(Error::InvalidArgument { .. })
        );
    }
}
