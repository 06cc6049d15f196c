//! Query and Mutation root fields

use indexmap::IndexMap;

use crate::error::SchemaError;

use super::pagination::PageDefaults;
use super::registry::Argument;
use super::wrapping::TypeString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
        }
    }
}

/// How a root field reaches the data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootAction {
    /// One record by `id`, or by a unique `key` attribute when the entity has one.
    Lookup { key: Option<String> },
    /// A filtered, paged list.
    Search,
    /// Create a record from the input object passed as `argument`.
    Create { argument: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootField {
    name: String,
    description: String,
    entity: String,
    action: RootAction,
}

impl RootField {
    pub fn lookup(name: &str, description: &str, entity: &str, key: Option<&str>) -> Self {
        Self::new(name, description, entity, RootAction::Lookup {
            key: key.map(str::to_string),
        })
    }

    pub fn search(name: &str, description: &str, entity: &str) -> Self {
        Self::new(name, description, entity, RootAction::Search)
    }

    pub fn create(name: &str, description: &str, entity: &str, argument: &str) -> Self {
        Self::new(name, description, entity, RootAction::Create {
            argument: argument.to_string(),
        })
    }

    fn new(name: &str, description: &str, entity: &str, action: RootAction) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            entity: entity.to_string(),
            action,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn action(&self) -> &RootAction {
        &self.action
    }

    /// Searches return `[T!]!`, everything else a nullable `T`.
    pub fn return_type(&self) -> TypeString {
        match self.action {
            RootAction::Search => TypeString::non_null_list_of(&self.entity),
            _ => TypeString::named(&self.entity),
        }
    }

    pub fn arguments(&self, pages: PageDefaults) -> Vec<Argument> {
        match &self.action {
            RootAction::Lookup { key: Some(key) } => vec![
                Argument::new("id", TypeString::named("ID")),
                Argument::new(key, TypeString::named("String")),
            ],
            RootAction::Lookup { key: None } => {
                vec![Argument::new("id", TypeString::named("ID").non_null())]
            }
            RootAction::Search => vec![
                Argument::new("filter", TypeString::named(format!("{}Filter", self.entity))),
                Argument::new("start", TypeString::named("Int")).with_default(0),
                Argument::new("limit", TypeString::named("Int")).with_default(pages.default_limit),
            ],
            RootAction::Create { argument } => vec![Argument::new(
                argument,
                TypeString::named(format!("{}Input", self.entity)).non_null(),
            )],
        }
    }
}

/// Root fields of both operation types.
#[derive(Debug, Clone, Default)]
pub struct RootFields {
    query: IndexMap<String, RootField>,
    mutation: IndexMap<String, RootField>,
}

impl RootFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, field: RootField) -> Self {
        self.query.insert(field.name.clone(), field);
        self
    }

    pub fn with_mutation(mut self, field: RootField) -> Self {
        self.mutation.insert(field.name.clone(), field);
        self
    }

    /// Lookups, searches and order placement over the storefront catalog.
    pub fn storefront() -> Self {
        Self::new()
            .with_query(RootField::lookup("product", "Look up a product by id or SKU.", "Product", Some("sku")))
            .with_query(RootField::lookup("customer", "Look up a customer by id.", "Customer", None))
            .with_query(RootField::lookup("order", "Look up an order by id.", "Order", None))
            .with_query(RootField::search("products", "Search products.", "Product"))
            .with_query(RootField::search("customers", "Search customers.", "Customer"))
            .with_query(RootField::search("orders", "Search orders.", "Order"))
            .with_mutation(RootField::create("placeOrder", "Place a new order.", "Order", "order"))
    }

    pub fn fields(&self, kind: OperationKind) -> impl Iterator<Item = &RootField> {
        match kind {
            OperationKind::Query => self.query.values(),
            OperationKind::Mutation => self.mutation.values(),
        }
    }

    pub fn get(&self, kind: OperationKind, name: &str) -> Result<&RootField, SchemaError> {
        let fields = match kind {
            OperationKind::Query => &self.query,
            OperationKind::Mutation => &self.mutation,
        };
        fields.get(name).ok_or_else(|| SchemaError::UnknownRootField {
            root: kind.type_name().to_string(),
            field: name.to_string(),
        })
    }
}
