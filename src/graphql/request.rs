//! Per-query request trees
//!
//! An [`EntityRequest`] mirrors the selection made against one entity: which
//! attributes were asked for and, for entity-valued attributes, which of the
//! target's attributes in turn. Trees are built per operation and dropped
//! with the response.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::catalog::{AttributeDefinition, EntityDefinition};
use crate::error::SchemaError;

use super::filters::FilterGroup;
use super::pagination::Window;

#[derive(Debug, Clone)]
pub struct EntityRequest {
    definition: Arc<EntityDefinition>,
    attributes: IndexMap<String, AttributeRequest>,
    typename: bool,
}

impl EntityRequest {
    pub fn new(definition: Arc<EntityDefinition>) -> Self {
        Self {
            definition,
            attributes: IndexMap::new(),
            typename: false,
        }
    }

    pub fn definition(&self) -> &Arc<EntityDefinition> {
        &self.definition
    }

    /// Requested attributes in selection order.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeRequest> {
        self.attributes.values()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeRequest> {
        self.attributes.get(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// `__typename` was selected.
    pub fn wants_typename(&self) -> bool {
        self.typename
    }

    pub(crate) fn request_typename(&mut self) {
        self.typename = true;
    }

    /// Add an attribute request. A second request for the same attribute is
    /// merged into the first when both carry the same window and filter.
    pub fn add(&mut self, request: AttributeRequest) -> Result<(), SchemaError> {
        let name = request.attribute.name().to_string();
        let Some(existing) = self.attributes.get_mut(&name) else {
            self.attributes.insert(name, request);
            return Ok(());
        };

        if existing.window != request.window || existing.filter != request.filter {
            return Err(SchemaError::ConflictingArguments {
                entity: self.definition.name().to_string(),
                attribute: name,
            });
        }
        match (&mut existing.nested, request.nested) {
            (Some(current), Some(other)) => current.merge(other)?,
            (current @ None, Some(other)) => *current = Some(other),
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn merge(&mut self, other: EntityRequest) -> Result<(), SchemaError> {
        self.typename |= other.typename;
        for request in other.attributes.into_values() {
            self.add(request)?;
        }
        Ok(())
    }
}

impl PartialEq for EntityRequest {
    fn eq(&self, other: &Self) -> bool {
        self.definition.name() == other.definition.name()
            && self.typename == other.typename
            && self.attributes == other.attributes
    }
}

impl fmt::Display for EntityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.definition.name())?;
        for (i, request) in self.attributes.values().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{request}")?;
        }
        f.write_str("]")
    }
}

/// One requested attribute.
#[derive(Debug, Clone)]
pub struct AttributeRequest {
    attribute: Arc<AttributeDefinition>,
    nested: Option<EntityRequest>,
    window: Option<Window>,
    filter: Vec<FilterGroup>,
}

impl AttributeRequest {
    pub fn new(attribute: Arc<AttributeDefinition>) -> Self {
        Self {
            attribute,
            nested: None,
            window: None,
            filter: Vec::new(),
        }
    }

    /// Only entity-valued attributes carry a nested request.
    pub(crate) fn with_nested(mut self, nested: EntityRequest) -> Self {
        debug_assert!(!self.attribute.is_scalar());
        self.nested = Some(nested);
        self
    }

    /// Windows only apply to repeating attributes.
    pub(crate) fn with_window(mut self, window: Option<Window>) -> Self {
        if self.attribute.is_repeating() {
            self.window = window;
        }
        self
    }

    pub(crate) fn with_filter(mut self, filter: Vec<FilterGroup>) -> Self {
        self.filter = filter;
        self
    }

    pub fn attribute(&self) -> &Arc<AttributeDefinition> {
        &self.attribute
    }

    pub fn name(&self) -> &str {
        self.attribute.name()
    }

    pub fn nested(&self) -> Option<&EntityRequest> {
        self.nested.as_ref()
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    /// Compiled nested filter, empty when none was given.
    pub fn filter(&self) -> &[FilterGroup] {
        &self.filter
    }
}

impl PartialEq for AttributeRequest {
    fn eq(&self, other: &Self) -> bool {
        self.attribute.name() == other.attribute.name()
            && self.nested == other.nested
            && self.window == other.window
            && self.filter == other.filter
    }
}

impl fmt::Display for AttributeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute.name())?;
        if self.attribute.is_repeating() {
            match self.window {
                Some(window) => write!(f, "{window}")?,
                None => f.write_str("(,)")?,
            }
        }
        if let Some(nested) = &self.nested {
            write!(f, ":{nested}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::EntityCatalog;

    fn request(catalog: &EntityCatalog, entity: &str) -> EntityRequest {
        EntityRequest::new(catalog.definition(entity).unwrap().clone())
    }

    fn attribute(catalog: &EntityCatalog, entity: &str, name: &str) -> AttributeRequest {
        AttributeRequest::new(catalog.definition(entity).unwrap().attribute(name).unwrap().clone())
    }

    #[test]
    fn test_display() {
        let catalog = EntityCatalog::storefront().unwrap();
        let mut item = request(&catalog, "OrderItem");
        item.add(attribute(&catalog, "OrderItem", "qty")).unwrap();

        let mut order = request(&catalog, "Order");
        order.add(attribute(&catalog, "Order", "id")).unwrap();
        order
            .add(
                attribute(&catalog, "Order", "items")
                    .with_window(Some(Window { start: 0, limit: Some(5) }))
                    .with_nested(item),
            )
            .unwrap();
        assert_eq!(order.to_string(), "Order[id items(0,5):OrderItem[qty]]");
    }

    #[test]
    fn test_duplicate_requests_merge() {
        let catalog = EntityCatalog::storefront().unwrap();
        let mut first = request(&catalog, "Address");
        first.add(attribute(&catalog, "Address", "city")).unwrap();
        let mut second = request(&catalog, "Address");
        second.add(attribute(&catalog, "Address", "zip")).unwrap();

        let mut order = request(&catalog, "Order");
        order.add(attribute(&catalog, "Order", "billingAddress").with_nested(first)).unwrap();
        order.add(attribute(&catalog, "Order", "billingAddress").with_nested(second)).unwrap();

        let nested = order.attribute("billingAddress").unwrap().nested().unwrap();
        assert_eq!(nested.len(), 2);
        assert!(nested.attribute("city").is_some() && nested.attribute("zip").is_some());
    }

    #[test]
    fn test_conflicting_windows_are_rejected() {
        let catalog = EntityCatalog::storefront().unwrap();
        let mut order = request(&catalog, "Order");
        order
            .add(attribute(&catalog, "Order", "items").with_window(Some(Window { start: 0, limit: Some(1) })))
            .unwrap();
        assert_matches!(
            order.add(attribute(&catalog, "Order", "items").with_window(Some(Window { start: 0, limit: Some(2) }))),
            Err(SchemaError::ConflictingArguments { attribute, .. }) if attribute == "items"
        );
    }

    #[test]
    fn test_window_ignored_on_single_attributes() {
        let catalog = EntityCatalog::storefront().unwrap();
        let sku = attribute(&catalog, "Product", "sku").with_window(Some(Window::default()));
        assert_eq!(sku.window(), None);
    }
}
