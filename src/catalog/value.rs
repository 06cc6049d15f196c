//! Attribute values and the per-record read adapter

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;

use super::definition::EntityDefinition;
use super::document::DocumentRecord;

/// A value read from a record.
#[derive(Clone, Default)]
pub enum AttributeValue {
    #[default]
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttributeValue>),
    Record(Arc<dyn Record>),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Convert a JSON value, wrapping objects as [`DocumentRecord`]s.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
            },
            serde_json::Value::String(s) => AttributeValue::String(s),
            serde_json::Value::Array(items) => {
                AttributeValue::List(items.into_iter().map(AttributeValue::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                AttributeValue::Record(Arc::new(DocumentRecord::new(map)))
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Arc<dyn Record>> {
        match self {
            AttributeValue::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str("Null"),
            AttributeValue::Boolean(b) => write!(f, "Boolean({b})"),
            AttributeValue::Int(i) => write!(f, "Int({i})"),
            AttributeValue::Float(x) => write!(f, "Float({x})"),
            AttributeValue::String(s) => write!(f, "String({s:?})"),
            AttributeValue::List(items) => f.debug_list().entries(items).finish(),
            AttributeValue::Record(_) => f.write_str("Record(..)"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

/// Records that carry a free-form attribute bag looked up by code.
pub trait CustomAttributes {
    fn custom_attribute(&self, code: &str) -> Option<AttributeValue>;
}

/// An opaque record handed out by a data source.
pub trait Record: Send + Sync + 'static {
    /// Field stored directly on the record.
    fn core(&self, code: &str) -> Option<AttributeValue>;

    /// Field from the record's extension namespace.
    fn extension(&self, _code: &str) -> Option<AttributeValue> {
        None
    }

    /// Present when the record supports custom-attribute lookup.
    fn custom_attributes(&self) -> Option<&dyn CustomAttributes> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A view pairing one record with the definition it is read against.
#[derive(Clone, Copy)]
pub struct EntityValue<'a> {
    definition: &'a EntityDefinition,
    record: &'a dyn Record,
}

impl<'a> EntityValue<'a> {
    pub fn new(definition: &'a EntityDefinition, record: &'a dyn Record) -> Self {
        Self { definition, record }
    }

    pub fn definition(&self) -> &'a EntityDefinition {
        self.definition
    }

    pub fn record(&self) -> &'a dyn Record {
        self.record
    }

    /// Read an attribute: computed function, core accessor, extension
    /// namespace, then custom attributes. Known but unset attributes read as
    /// [`AttributeValue::Null`]; names the definition does not declare are an
    /// error.
    pub fn get_attribute(&self, name: &str) -> Result<AttributeValue, SchemaError> {
        let attribute =
            self.definition
                .attribute(name)
                .ok_or_else(|| SchemaError::UnknownAttribute {
                    entity: self.definition.name().to_string(),
                    attribute: name.to_string(),
                })?;

        if let Some(value) = attribute.compute(self.record) {
            return Ok(value);
        }
        if let Some(value) = attribute.read_core(self.record) {
            return Ok(value);
        }
        if let Some(value) = self.record.extension(name) {
            return Ok(value);
        }
        Ok(self
            .record
            .custom_attributes()
            .and_then(|custom| custom.custom_attribute(name))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::catalog::definition::{AttributeDefinition, ScalarKind};

    fn product() -> EntityDefinition {
        EntityDefinition::new(
            "Product",
            "Product.",
            [
                AttributeDefinition::scalar("sku", "SKU", ScalarKind::String, false),
                AttributeDefinition::scalar("label", "Label", ScalarKind::String, false)
                    .computed(|_| AttributeValue::from("computed")),
                AttributeDefinition::scalar("color", "Color", ScalarKind::String, true),
                AttributeDefinition::scalar("material", "Material", ScalarKind::String, true),
                AttributeDefinition::scalar("weight", "Weight", ScalarKind::Float, true),
            ],
        )
    }

    fn record() -> DocumentRecord {
        DocumentRecord::from_json(json!({
            "sku": "24-MB01",
            "label": "stored",
            "extension_attributes": { "color": "red" },
            "custom_attributes": [ { "attribute_code": "material", "value": "leather" } ]
        }))
        .unwrap()
    }

    #[test]
    fn test_computed_wins_over_core() {
        let def = product();
        let record = record();
        let value = EntityValue::new(&def, &record);
        assert_matches!(value.get_attribute("label"), Ok(AttributeValue::String(s)) if s == "computed");
    }

    #[test]
    fn test_lookup_order() {
        let def = product();
        let record = record();
        let value = EntityValue::new(&def, &record);
        assert_matches!(value.get_attribute("sku"), Ok(AttributeValue::String(s)) if s == "24-MB01");
        assert_matches!(value.get_attribute("color"), Ok(AttributeValue::String(s)) if s == "red");
        assert_matches!(value.get_attribute("material"), Ok(AttributeValue::String(s)) if s == "leather");
    }

    #[test]
    fn test_known_but_unset_is_null() {
        let def = product();
        let record = record();
        let value = EntityValue::new(&def, &record);
        assert_matches!(value.get_attribute("weight"), Ok(AttributeValue::Null));
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let def = product();
        let record = record();
        let value = EntityValue::new(&def, &record);
        assert_matches!(
            value.get_attribute("price"),
            Err(SchemaError::UnknownAttribute { attribute, .. }) if attribute == "price"
        );
    }
}
