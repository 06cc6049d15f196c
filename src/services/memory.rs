//! In-memory data source backed by JSON documents
//!
//! Records are grouped by entity name and indexed by `id` and, where one is
//! registered, by the entity's lookup key. Searches run the same filter
//! matcher used for nested list filters.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::catalog::{DocumentRecord, EntityCatalog, EntityDefinition, EntityValue, Record, ScalarKind};
use crate::graphql::filters::{FilterGroup, FilterMatcher};
use crate::graphql::pagination::Page;

use super::data_source::DataSource;

#[derive(Default)]
struct Collection {
    records: Vec<Arc<DocumentRecord>>,
    by_id: HashMap<String, usize>,
    by_key: HashMap<String, usize>,
}

pub struct InMemoryDataSource {
    catalog: Arc<EntityCatalog>,
    /// Lookup key attribute per entity
    keys: HashMap<String, String>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryDataSource {
    pub fn new(catalog: Arc<EntityCatalog>) -> Self {
        Self {
            catalog,
            keys: HashMap::new(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Index `entity` records by `attribute` as well as by id.
    pub fn with_key(mut self, entity: &str, attribute: &str) -> Self {
        self.keys.insert(entity.to_string(), attribute.to_string());
        self
    }

    /// Empty source with the storefront lookup keys registered.
    pub fn storefront(catalog: Arc<EntityCatalog>) -> Self {
        Self::new(catalog).with_key("Product", "sku")
    }

    /// Load a fixture file of the form `{ "Entity": [ {..}, .. ], .. }`.
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read data file {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON in data file {}", path.display()))?;
        self.load_json(value)
    }

    /// Load an already parsed fixture. Returns the number of records added.
    pub fn load_json(&self, fixture: Value) -> Result<usize> {
        let Value::Object(entities) = fixture else {
            bail!("fixture must be an object keyed by entity name");
        };
        let mut count = 0;
        for (entity, records) in entities {
            let Value::Array(records) = records else {
                bail!("fixture entry for {entity} must be a list of records");
            };
            for record in records {
                let Value::Object(fields) = record else {
                    bail!("fixture records for {entity} must be objects");
                };
                self.insert(&entity, fields)?;
                count += 1;
            }
        }
        debug!(records = count, "Loaded fixture");
        Ok(count)
    }

    /// Store a record, generating ids for it and its nested records where missing.
    pub fn insert(&self, entity: &str, mut fields: Map<String, Value>) -> Result<Arc<DocumentRecord>> {
        let definition = self.catalog.require(entity)?;
        assign_ids(&self.catalog, definition, &mut fields);
        let record = Arc::new(DocumentRecord::new(fields));
        let id = record
            .id()
            .ok_or_else(|| anyhow!("{entity} record has no usable id"))?;
        let key = self
            .keys
            .get(entity)
            .and_then(|attribute| record.raw(attribute))
            .and_then(text);

        let mut collections = self.collections.write();
        let collection = collections.entry(entity.to_string()).or_default();
        if collection.by_id.contains_key(&id) {
            bail!("duplicate id '{id}' for {entity}");
        }
        let index = collection.records.len();
        if let Some(key) = key {
            if collection.by_key.contains_key(&key) {
                bail!("duplicate key '{key}' for {entity}");
            }
            collection.by_key.insert(key, index);
        }
        collection.by_id.insert(id, index);
        collection.records.push(record.clone());
        Ok(record)
    }

    /// Number of stored records of `entity`.
    pub fn len(&self, entity: &str) -> usize {
        self.collections
            .read()
            .get(entity)
            .map_or(0, |collection| collection.records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.collections
            .read()
            .values()
            .all(|collection| collection.records.is_empty())
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn fetch_by_id(&self, entity: &str, id: &str) -> Result<Option<Arc<dyn Record>>> {
        self.catalog.require(entity)?;
        let collections = self.collections.read();
        Ok(collections.get(entity).and_then(|collection| {
            let index = *collection.by_id.get(id)?;
            Some(collection.records[index].clone() as Arc<dyn Record>)
        }))
    }

    async fn fetch_by_key(&self, entity: &str, attribute: &str, key: &str) -> Result<Option<Arc<dyn Record>>> {
        self.catalog.require(entity)?;
        if self.keys.get(entity).map(String::as_str) != Some(attribute) {
            bail!("{entity} is not indexed by {attribute}");
        }
        let collections = self.collections.read();
        Ok(collections.get(entity).and_then(|collection| {
            let index = *collection.by_key.get(key)?;
            Some(collection.records[index].clone() as Arc<dyn Record>)
        }))
    }

    async fn search(&self, entity: &str, filter: &[FilterGroup], page: Page) -> Result<Vec<Arc<dyn Record>>> {
        let definition = self.catalog.require(entity)?;
        let matcher = FilterMatcher::new(&self.catalog);
        let collections = self.collections.read();
        let Some(collection) = collections.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(collection
            .records
            .iter()
            .filter(|record| matcher.matches(EntityValue::new(definition, &***record), filter))
            .skip(page.start)
            .take(page.limit)
            .map(|record| record.clone() as Arc<dyn Record>)
            .collect())
    }

    async fn create(&self, entity: &str, input: Map<String, Value>) -> Result<Arc<dyn Record>> {
        let record = self.insert(entity, input)?;
        debug!(entity, id = ?record.id(), "Created record");
        Ok(record)
    }
}

/// Fill in missing `ID` attributes of a record and of the records nested in it.
fn assign_ids(catalog: &EntityCatalog, definition: &EntityDefinition, fields: &mut Map<String, Value>) {
    for attribute in definition.attributes() {
        match attribute.scalar_kind() {
            Some(ScalarKind::Id) => {
                if fields.get(attribute.name()).is_none_or(Value::is_null) {
                    fields.insert(attribute.name().to_string(), Value::String(Uuid::new_v4().to_string()));
                }
            }
            Some(_) => {}
            None => {
                let Some(target) = catalog.definition(attribute.type_name()) else {
                    continue;
                };
                match fields.get_mut(attribute.name()) {
                    Some(Value::Object(nested)) => assign_ids(catalog, target, nested),
                    Some(Value::Array(items)) => {
                        for item in items {
                            if let Value::Object(nested) = item {
                                assign_ids(catalog, target, nested);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::graphql::filters::{Condition, Constraint, Operand};

    fn source() -> InMemoryDataSource {
        let source = InMemoryDataSource::storefront(Arc::new(EntityCatalog::storefront().unwrap()));
        source
            .load_json(json!({
                "Product": [
                    { "id": "1", "sku": "MUG-1", "description": "Mug", "price": 9.5 },
                    { "id": "2", "sku": "TEE-1", "description": "Shirt", "price": 20 },
                    { "id": "3", "sku": "CAP-1", "description": "Cap", "price": 15 }
                ]
            }))
            .unwrap();
        source
    }

    fn sku(record: &Arc<dyn Record>) -> String {
        record.core("sku").and_then(|v| v.as_str().map(str::to_string)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_by_id_and_key() {
        let source = source();
        let by_id = source.fetch_by_id("Product", "2").await.unwrap().unwrap();
        assert_eq!(sku(&by_id), "TEE-1");
        let by_key = source.fetch_by_key("Product", "sku", "CAP-1").await.unwrap().unwrap();
        assert_eq!(by_key.core("id").and_then(|v| v.as_str().map(str::to_string)).as_deref(), Some("3"));
        assert!(source.fetch_by_id("Product", "404").await.unwrap().is_none());
        assert!(source.fetch_by_key("Customer", "email", "x").await.is_err());
        assert!(source.fetch_by_id("Widget", "1").await.is_err());
    }

    #[tokio::test]
    async fn test_search_filters_then_pages() {
        let source = source();
        let cheap = [FilterGroup::new(vec![Constraint::new(
            "price",
            Condition::Gt(Operand::Int(10)),
        )])];
        let found = source
            .search("Product", &cheap, Page { start: 0, limit: 10 })
            .await
            .unwrap();
        assert_eq!(found.iter().map(sku).collect::<Vec<_>>(), vec!["TEE-1", "CAP-1"]);

        let paged = source.search("Product", &[], Page { start: 1, limit: 1 }).await.unwrap();
        assert_eq!(paged.iter().map(sku).collect::<Vec<_>>(), vec!["TEE-1"]);
        assert!(source.search("Order", &[], Page { start: 0, limit: 5 }).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let source = source();
        let input = json!({
            "shippingMethod": "flatrate",
            "items": [ { "qty": 1.0 }, { "qty": 2.0 } ]
        });
        let Value::Object(input) = input else { unreachable!() };
        let order = source.create("Order", input).await.unwrap();
        let document = order.as_any().downcast_ref::<DocumentRecord>().unwrap();
        let id = document.id().unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        let items = document.raw("items").unwrap().as_array().unwrap();
        assert!(items.iter().all(|item| item.get("id").is_some_and(Value::is_string)));
        assert!(source.fetch_by_id("Order", &id).await.unwrap().is_some());
        assert_eq!(source.len("Order"), 1);
    }

    #[test]
    fn test_bad_fixtures_are_rejected() {
        let source = InMemoryDataSource::storefront(Arc::new(EntityCatalog::storefront().unwrap()));
        assert!(source.load_json(json!([])).is_err());
        assert!(source.load_json(json!({ "Widget": [ {} ] })).is_err());
        assert!(source.load_json(json!({ "Product": [ "nope" ] })).is_err());
        assert_matches!(
            source.load_json(json!({ "Product": [ { "id": "1", "sku": "A" }, { "id": "1", "sku": "B" } ] })),
            Err(e) if e.to_string().contains("duplicate id")
        );
    }
}
