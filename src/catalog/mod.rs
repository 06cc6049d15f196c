//! Entity catalog
//!
//! The catalog is built once at startup and only read afterwards, so it can be
//! shared between requests without locking.

mod definition;
pub mod discovery;
mod document;
mod value;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::SchemaError;

pub use definition::{Accessor, AttributeDefinition, ComputeFn, EntityDefinition, ScalarKind};
pub use document::DocumentRecord;
pub use value::{AttributeValue, CustomAttributes, EntityValue, Record};

/// Registry of entity definitions by name.
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entities: IndexMap<String, Arc<EntityDefinition>>,
}

impl EntityCatalog {
    /// Build from a fixed table; names must be unique.
    pub fn new(
        definitions: impl IntoIterator<Item = EntityDefinition>,
    ) -> Result<Self, SchemaError> {
        let mut entities = IndexMap::new();
        for definition in definitions {
            let name = definition.name().to_string();
            if entities.contains_key(&name) {
                return Err(SchemaError::DuplicateEntity { entity: name });
            }
            entities.insert(name, Arc::new(definition));
        }
        Ok(Self { entities })
    }

    /// `None` when the name is not registered.
    pub fn definition(&self, name: &str) -> Option<&Arc<EntityDefinition>> {
        self.entities.get(name)
    }

    /// Like [`Self::definition`] but reports the missing name as an error.
    pub fn require(&self, name: &str) -> Result<&Arc<EntityDefinition>, SchemaError> {
        self.definition(name)
            .ok_or_else(|| SchemaError::UnknownEntity {
                entity: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// The storefront entity table. Product also carries attributes
    /// discovered from host metadata.
    pub fn storefront() -> Result<Self, SchemaError> {
        use AttributeDefinition as A;
        use ScalarKind::*;

        let product = discovery::with_discovered(
            EntityDefinition::new(
                "Product",
                "Product.",
                [
                    A::scalar("id", "Product id", Id, false),
                    A::scalar("sku", "SKU", String, false),
                    A::scalar("description", "Product description.", String, false),
                    A::entity("comments", "Customer comments", "Comment", true, false),
                ],
            ),
            discovery::PRODUCT_METADATA,
        );

        Self::new([
            EntityDefinition::new(
                "Customer",
                "Customer entity.",
                [
                    A::scalar("id", "Customer id", Id, false),
                    A::scalar("name", "Customer name", String, false).computed(full_name),
                    A::scalar("email", "Customer email address", String, false),
                    A::entity("addresses", "Customer addresses", "Address", true, false),
                    A::entity("quotes", "Quotes for this customer", "Quote", true, false),
                    A::entity("wishlists", "Wishlists for this customer", "Wishlist", true, false),
                    A::entity("orders", "Orders placed by this customer", "Order", true, false),
                ],
            ),
            EntityDefinition::new(
                "Address",
                "Address entity.",
                [
                    A::scalar("id", "Address id", Id, false),
                    A::scalar("country", "Country", String, false),
                    A::scalar("city", "City", String, false),
                    A::scalar("street", "Street", String, false),
                    A::scalar("zip", "Postal code", String, false),
                ],
            ),
            EntityDefinition::new(
                "Quote",
                "Quote entity.",
                [
                    A::scalar("id", "Quote id", Id, false),
                    A::scalar("name", "Quote name", String, false),
                    A::entity("items", "Items in quote", "QuoteItem", true, false),
                    A::scalar("isDefault", "True if the default", Boolean, false),
                ],
            ),
            EntityDefinition::new(
                "QuoteItem",
                "Quote item entity.",
                [
                    A::scalar("id", "Quote item id", Id, false),
                    A::entity("product", "Product added to quote", "Product", false, false),
                    A::scalar("qty", "Quantity of item", Float, false),
                    A::entity("options", "Product options for item in quote", "ProductOption", true, false),
                ],
            ),
            EntityDefinition::new(
                "Wishlist",
                "Wishlist entity.",
                [
                    A::scalar("id", "Wishlist id", Id, false),
                    A::scalar("name", "Wishlist name", String, false),
                    A::entity("items", "Items in wishlist", "WishlistItem", true, false),
                    A::scalar("isDefault", "True if the default", Boolean, false),
                ],
            ),
            EntityDefinition::new(
                "WishlistItem",
                "Wishlist item entity.",
                [
                    A::scalar("id", "Wishlist item id", Id, false),
                    A::entity("product", "Product added to wishlist", "Product", false, true),
                    A::scalar("qty", "Quantity of item", Float, false),
                    A::entity("options", "Product options for item in wishlist", "ProductOption", true, false),
                ],
            ),
            EntityDefinition::new(
                "Order",
                "Order entity.",
                [
                    A::scalar("id", "Order id", Id, false),
                    A::entity("customer", "Customer who placed the order", "Customer", false, true),
                    A::entity("items", "Items in order", "OrderItem", true, false),
                    A::entity("billingAddress", "Billing address", "Address", false, true),
                    A::entity("shippingAddress", "Shipping address", "Address", false, true),
                    A::scalar("shippingMethod", "Shipping method", String, false),
                    A::entity("paymentInfo", "Payment information", "PaymentInfo", true, false),
                ],
            ),
            EntityDefinition::new(
                "OrderItem",
                "Order item entity.",
                [
                    A::scalar("id", "Order item id", Id, false),
                    A::entity("product", "Product added to order", "Product", false, true),
                    A::scalar("qty", "Quantity of item", Float, false),
                    A::entity("options", "Product options for item in order", "ProductOption", true, false),
                ],
            ),
            EntityDefinition::new(
                "PaymentInfo",
                "Payment information entity.",
                [
                    A::scalar("id", "Payment info id", Id, false),
                    A::scalar("paymentMethodCode", "Payment method", String, false),
                    A::scalar("amount", "Payment amount", Float, false),
                ],
            ),
            EntityDefinition::new(
                "Return",
                "Return entity.",
                [
                    A::scalar("id", "Return id", Id, false),
                    A::scalar("orderId", "Order that was returned", String, false),
                    A::entity("items", "Returned items", "OrderItem", true, false),
                ],
            ),
            product,
            EntityDefinition::new(
                "ProductOption",
                "Product option.",
                [
                    A::scalar("attribute", "Product attribute.", String, false),
                    A::scalar("value", "Value selected when product was ordered", String, false),
                ],
            ),
            EntityDefinition::new(
                "Comment",
                "Product comment.",
                [
                    A::scalar("author", "Author of comment.", String, false),
                    A::scalar("text", "Comment text.", String, false),
                ],
            ),
        ])
    }
}

/// `firstname lastname`, skipping whichever part is missing.
fn full_name(record: &dyn Record) -> AttributeValue {
    let parts: Vec<String> = ["firstname", "lastname"]
        .into_iter()
        .filter_map(|code| match record.core(code) {
            Some(AttributeValue::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        AttributeValue::Null
    } else {
        AttributeValue::String(parts.join(" "))
    }
}
