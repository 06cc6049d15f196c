//! JSON-backed records
//!
//! Top-level keys are core fields. The `extension_attributes` object holds the
//! extension namespace and `custom_attributes` is a list of
//! `{ "attribute_code": .., "value": .. }` entries.

use std::any::Any;

use serde_json::{Map, Value};

use super::value::{AttributeValue, CustomAttributes, Record};

const EXTENSION_KEY: &str = "extension_attributes";
const CUSTOM_KEY: &str = "custom_attributes";

#[derive(Debug, Clone, Default)]
pub struct DocumentRecord {
    fields: Map<String, Value>,
}

impl DocumentRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// `None` unless the value is a JSON object.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    /// Raw JSON of a core field.
    pub fn raw(&self, code: &str) -> Option<&Value> {
        match code {
            EXTENSION_KEY | CUSTOM_KEY => None,
            _ => self.fields.get(code),
        }
    }

    /// The `id` field as a string, numeric ids included.
    pub fn id(&self) -> Option<String> {
        match self.raw("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl Record for DocumentRecord {
    fn core(&self, code: &str) -> Option<AttributeValue> {
        self.raw(code).cloned().map(AttributeValue::from_json)
    }

    fn extension(&self, code: &str) -> Option<AttributeValue> {
        self.fields
            .get(EXTENSION_KEY)?
            .get(code)
            .cloned()
            .map(AttributeValue::from_json)
    }

    fn custom_attributes(&self) -> Option<&dyn CustomAttributes> {
        if self.fields.contains_key(CUSTOM_KEY) {
            Some(self as &dyn CustomAttributes)
        } else {
            None
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl CustomAttributes for DocumentRecord {
    fn custom_attribute(&self, code: &str) -> Option<AttributeValue> {
        self.fields
            .get(CUSTOM_KEY)?
            .as_array()?
            .iter()
            .find(|entry| entry.get("attribute_code").and_then(Value::as_str) == Some(code))
            .and_then(|entry| entry.get("value"))
            .cloned()
            .map(AttributeValue::from_json)
    }
}
