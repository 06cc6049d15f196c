//! Operation execution
//!
//! An operation runs in two phases. Planning turns every root field into an
//! action plus a request tree; any error there fails the whole operation.
//! Resolution then fetches through the [`DataSource`] and serializes the
//! records by walking the request tree. A resolution error nulls its root
//! field, or the whole `data` object when the root field is non-null.
//!
//! Operations that only select `__schema`, `__type` and `__typename` are
//! answered by the introspection schema instead.

use std::sync::Arc;

use anyhow::anyhow;
use async_graphql::dynamic::Schema;
use async_graphql::parser::Positioned;
use async_graphql::parser::parse_query;
use async_graphql::parser::types::{
    DocumentOperations, ExecutableDocument, Field, OperationDefinition, OperationType, SelectionSet,
};
use async_graphql::{Request, Response, ServerError, Value as ConstValue, Variables};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::catalog::{AttributeValue, EntityValue, Record, ScalarKind};
use crate::error::{Error, Result, SchemaError};
use crate::services::data_source::DataSource;

use super::filters::{FilterCompiler, FilterGroup, FilterMatcher};
use super::input::InputValidator;
use super::introspection::{build_introspection_schema, is_introspection_field};
use super::pagination::{Page, PageDefaults, parse_page_args};
use super::planner::{QueryPlanner, TYPENAME_FIELD, int_argument, reject_alias};
use super::registry::{OutputField, OutputTarget, TypeRegistry};
use super::request::{AttributeRequest, EntityRequest};
use super::roots::{OperationKind, RootAction, RootField, RootFields};

fn failed(error: Error) -> Response {
    Response::from_errors(vec![error.to_server_error(None)])
}

fn respond(data: Option<Value>, errors: Vec<ServerError>) -> Response {
    let data = match data.map(ConstValue::from_json).transpose() {
        Ok(data) => data.unwrap_or(ConstValue::Null),
        Err(e) => return failed(Error::DataSource(anyhow!(e))),
    };
    let mut response = Response::new(data);
    response.errors = errors;
    response
}

/// What a planned root field does once resolution starts.
#[derive(Debug, Clone)]
enum Action {
    ById(String),
    ByKey { attribute: String, key: String },
    Ambiguous { first: String, second: String },
    Search { filter: Vec<FilterGroup>, page: Page },
    Create(Map<String, Value>),
}

struct PlannedRoot<'r> {
    field: &'r RootField,
    arguments: IndexMap<String, ConstValue>,
    action: Action,
    request: EntityRequest,
}

enum Planned<'r> {
    Typename,
    Root(PlannedRoot<'r>),
}

impl Planned<'_> {
    fn name(&self) -> &str {
        match self {
            Planned::Typename => TYPENAME_FIELD,
            Planned::Root(root) => root.field.name(),
        }
    }
}

/// Runs GraphQL operations against the catalog and a data source.
pub struct Executor {
    registry: Arc<TypeRegistry>,
    roots: RootFields,
    data_source: Arc<dyn DataSource>,
    pages: PageDefaults,
    introspection: OnceCell<Schema>,
}

impl Executor {
    pub fn new(
        registry: Arc<TypeRegistry>,
        roots: RootFields,
        data_source: Arc<dyn DataSource>,
        pages: PageDefaults,
    ) -> Self {
        Self {
            registry,
            roots,
            data_source,
            pages,
            introspection: OnceCell::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn roots(&self) -> &RootFields {
        &self.roots
    }

    /// Schema text for the configured roots.
    pub fn sdl(&self) -> Result<String, SchemaError> {
        self.registry.sdl(&self.roots, self.pages)
    }

    /// Schema answering introspection queries, built on first use.
    pub fn introspection(&self) -> Result<&Schema, SchemaError> {
        self.introspection
            .get_or_try_init(|| build_introspection_schema(&self.registry, &self.roots, self.pages))
    }

    /// Execute one operation of a request.
    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        let request = request.into();
        let document = match parse_query(&request.query) {
            Ok(document) => document,
            Err(e) => return failed(Error::Syntax(e.to_string())),
        };
        let operation = match select_operation(&document, request.operation_name.as_deref()) {
            Ok(operation) => operation,
            Err(e) => return failed(e),
        };
        let kind = match operation.node.ty {
            OperationType::Query => OperationKind::Query,
            OperationType::Mutation => OperationKind::Mutation,
            OperationType::Subscription => {
                return failed(Error::UnsupportedOperation(
                    "subscriptions are not supported".to_string(),
                ));
            }
        };

        let variables = with_defaults(request.variables.clone(), &operation.node);
        let planner = QueryPlanner::new(self.registry.catalog(), &document, &variables);
        let selection_set = &operation.node.selection_set.node;
        match self.is_introspection(&planner, selection_set) {
            Ok(false) => {}
            Ok(true) => {
                debug!("Answering introspection query");
                return match self.introspection() {
                    Ok(schema) => schema.execute(request).await,
                    Err(e) => {
                        warn!(error = %e, "Introspection schema unavailable");
                        failed(e.into())
                    }
                };
            }
            Err(e) => return failed(e),
        }

        let planned = match self.plan(&planner, kind, selection_set) {
            Ok(planned) => planned,
            Err(e) => {
                debug!(error = %e, "Operation rejected during planning");
                return failed(e);
            }
        };

        let mut data = Map::new();
        let mut errors = Vec::new();
        let mut data_is_null = false;
        for item in &planned {
            let root = match item {
                Planned::Typename => {
                    data.insert(TYPENAME_FIELD.to_string(), Value::String(kind.type_name().to_string()));
                    continue;
                }
                Planned::Root(root) => root,
            };
            let name = root.field.name().to_string();
            match self.resolve(root).await {
                Ok(value) => {
                    data.insert(name, value);
                }
                Err(e) => {
                    if e.is_client_error() {
                        debug!(field = %name, error = %e, "Root field failed");
                    } else {
                        warn!(field = %name, error = %e, "Root field failed");
                    }
                    errors.push(e.to_server_error(Some(&name)));
                    data_is_null |= root.field.return_type().is_non_null();
                    data.insert(name, Value::Null);
                }
            }
        }

        respond((!data_is_null).then_some(Value::Object(data)), errors)
    }

    /// True when every root field is an introspection field and at least one
    /// is more than `__typename`.
    fn is_introspection<'q>(&self, planner: &QueryPlanner<'q>, selection_set: &'q SelectionSet) -> Result<bool> {
        let fields = planner.root_fields(selection_set)?;
        let introspective = fields
            .iter()
            .filter(|field| is_introspection_field(field.node.name.node.as_str()))
            .count();
        if introspective == 0 {
            return Ok(false);
        }
        let data_fields = fields
            .iter()
            .filter(|field| {
                let name = field.node.name.node.as_str();
                name != TYPENAME_FIELD && !is_introspection_field(name)
            })
            .count();
        if data_fields > 0 {
            return Err(Error::UnsupportedOperation(
                "introspection fields can not be combined with entity fields".to_string(),
            ));
        }
        Ok(true)
    }

    fn plan<'r, 'q>(
        &'r self,
        planner: &QueryPlanner<'q>,
        kind: OperationKind,
        selection_set: &'q SelectionSet,
    ) -> Result<Vec<Planned<'r>>> {
        let mut planned: Vec<Planned<'r>> = Vec::new();
        for field in planner.root_fields(selection_set)? {
            let next = self.plan_root(planner, kind, &field.node)?;
            match planned.iter_mut().find(|existing| existing.name() == next.name()) {
                None => planned.push(next),
                Some(Planned::Typename) => {}
                Some(Planned::Root(existing)) => {
                    let Planned::Root(next) = next else { continue };
                    if existing.arguments != next.arguments {
                        return Err(SchemaError::ConflictingArguments {
                            entity: kind.type_name().to_string(),
                            attribute: next.field.name().to_string(),
                        }
                        .into());
                    }
                    existing.request.merge(next.request)?;
                }
            }
        }
        Ok(planned)
    }

    fn plan_root<'r>(&'r self, planner: &QueryPlanner<'_>, kind: OperationKind, field: &Field) -> Result<Planned<'r>> {
        reject_alias(field)?;
        let name = field.name.node.as_str();
        if name == TYPENAME_FIELD {
            return Ok(Planned::Typename);
        }

        let root = self.roots.get(kind, name)?;
        let arguments = planner.arguments(field)?;
        let accepted = root.arguments(self.pages);
        if let Some(unknown) = arguments.keys().find(|a| !accepted.iter().any(|b| &b.name == *a)) {
            return Err(Error::InvalidArgument {
                field: name.to_string(),
                argument: unknown.clone(),
                reason: "unknown argument".to_string(),
            });
        }

        let action = match root.action() {
            RootAction::Lookup { key } => lookup_action(name, &arguments, key.as_deref())?,
            RootAction::Search => {
                let definition = self.registry.catalog().require(root.entity())?;
                let filter = FilterCompiler::new(self.registry.catalog())
                    .compile(definition, arguments.get("filter").unwrap_or(&ConstValue::Null))?;
                let start = optional(&arguments, "start").map(|v| int_argument(name, "start", v));
                let limit = optional(&arguments, "limit").map(|v| int_argument(name, "limit", v));
                let page = parse_page_args(
                    start.transpose()?.flatten(),
                    limit.transpose()?.flatten(),
                    self.pages,
                )
                .map_err(|reason| Error::InvalidArgument {
                    field: name.to_string(),
                    argument: "start/limit".to_string(),
                    reason,
                })?;
                Action::Search { filter, page }
            }
            RootAction::Create { argument } => {
                let value = optional(&arguments, argument).ok_or_else(|| Error::MissingArgument {
                    field: name.to_string(),
                    expected: format!("'{argument}'"),
                })?;
                let input = self.registry.input_type(root.entity())?;
                let fields = InputValidator::new(&self.registry, name).validate(&input, value, argument)?;
                Action::Create(fields)
            }
        };

        let request = planner.plan(&root.return_type().to_string(), &field.selection_set.node)?;
        Ok(Planned::Root(PlannedRoot {
            field: root,
            arguments,
            action,
            request,
        }))
    }

    async fn resolve(&self, root: &PlannedRoot<'_>) -> Result<Value> {
        let entity = root.field.entity();
        debug!(field = root.field.name(), entity, action = ?root.action, "Resolving root field");
        let serializer = Serializer::new(&self.registry);
        match &root.action {
            Action::ById(id) => {
                let record = self
                    .data_source
                    .fetch_by_id(entity, id)
                    .await
                    .map_err(Error::DataSource)?;
                serializer.optional_record(&root.request, record)
            }
            Action::ByKey { attribute, key } => {
                let record = self
                    .data_source
                    .fetch_by_key(entity, attribute, key)
                    .await
                    .map_err(Error::DataSource)?;
                serializer.optional_record(&root.request, record)
            }
            Action::Ambiguous { first, second } => Err(Error::ResolutionAmbiguity {
                field: root.field.name().to_string(),
                first: first.clone(),
                second: second.clone(),
            }),
            Action::Search { filter, page } => {
                let records = self
                    .data_source
                    .search(entity, filter, *page)
                    .await
                    .map_err(Error::DataSource)?;
                records
                    .iter()
                    .map(|record| serializer.record(&root.request, &**record))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array)
            }
            Action::Create(input) => {
                let record = self
                    .data_source
                    .create(entity, input.clone())
                    .await
                    .map_err(Error::DataSource)?;
                serializer.record(&root.request, &*record)
            }
        }
    }
}

fn select_operation<'d>(
    document: &'d ExecutableDocument,
    name: Option<&str>,
) -> Result<&'d Positioned<OperationDefinition>> {
    match (&document.operations, name) {
        (DocumentOperations::Single(operation), _) => Ok(operation),
        (DocumentOperations::Multiple(operations), Some(name)) => operations
            .get(name)
            .ok_or_else(|| Error::UnsupportedOperation(format!("unknown operation '{name}'"))),
        (DocumentOperations::Multiple(operations), None) if operations.len() == 1 => operations
            .values()
            .next()
            .ok_or_else(|| Error::UnsupportedOperation("document has no operations".to_string())),
        (DocumentOperations::Multiple(_), None) => Err(Error::UnsupportedOperation(
            "an operation name is required when the document has several operations".to_string(),
        )),
    }
}

/// Fill in variable defaults declared by the operation.
fn with_defaults(mut variables: Variables, operation: &OperationDefinition) -> Variables {
    for definition in &operation.variable_definitions {
        let name = &definition.node.name.node;
        if !variables.contains_key(name)
            && let Some(default) = &definition.node.default_value
        {
            variables.insert(name.clone(), default.node.clone());
        }
    }
    variables
}

/// An argument value, treating explicit nulls as absent.
fn optional<'v>(arguments: &'v IndexMap<String, ConstValue>, name: &str) -> Option<&'v ConstValue> {
    arguments.get(name).filter(|value| !matches!(value, ConstValue::Null))
}

fn lookup_action(field: &str, arguments: &IndexMap<String, ConstValue>, key: Option<&str>) -> Result<Action> {
    let id = optional(arguments, "id")
        .map(|value| match value {
            ConstValue::String(s) => Ok(s.clone()),
            ConstValue::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            _ => Err(Error::InvalidArgument {
                field: field.to_string(),
                argument: "id".to_string(),
                reason: "expected an ID".to_string(),
            }),
        })
        .transpose()?;

    let key_value = match key {
        Some(key) => optional(arguments, key)
            .map(|value| match value {
                ConstValue::String(s) => Ok((key.to_string(), s.clone())),
                _ => Err(Error::InvalidArgument {
                    field: field.to_string(),
                    argument: key.to_string(),
                    reason: "expected a String".to_string(),
                }),
            })
            .transpose()?,
        None => None,
    };

    match (id, key_value) {
        (Some(_), Some((attribute, _))) => Ok(Action::Ambiguous {
            first: "id".to_string(),
            second: attribute,
        }),
        (Some(id), None) => Ok(Action::ById(id)),
        (None, Some((attribute, key))) => Ok(Action::ByKey { attribute, key }),
        (None, None) => Err(Error::MissingArgument {
            field: field.to_string(),
            expected: match key {
                Some(key) => format!("'id' or '{key}'"),
                None => "'id'".to_string(),
            },
        }),
    }
}

/// Turns records into JSON by walking a request tree.
struct Serializer<'a> {
    registry: &'a TypeRegistry,
    matcher: FilterMatcher<'a>,
}

impl<'a> Serializer<'a> {
    fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            matcher: FilterMatcher::new(registry.catalog()),
        }
    }

    fn optional_record(&self, request: &EntityRequest, record: Option<Arc<dyn Record>>) -> Result<Value> {
        match record {
            Some(record) => self.record(request, &*record),
            None => Ok(Value::Null),
        }
    }

    fn record(&self, request: &EntityRequest, record: &dyn Record) -> Result<Value> {
        let definition = request.definition();
        let object = self.registry.object_type(definition.name())?;
        let value = EntityValue::new(definition, record);

        let mut out = Map::new();
        if request.wants_typename() {
            out.insert(TYPENAME_FIELD.to_string(), Value::String(object.name().to_string()));
        }
        for attribute in request.attributes() {
            let field = object.field(self.registry, attribute.name())?;
            let raw = field.resolve(value)?;
            let json = self.attribute(definition.name(), field, attribute, raw)?;
            out.insert(attribute.name().to_string(), json);
        }
        Ok(Value::Object(out))
    }

    fn attribute(
        &self,
        entity: &str,
        field: &OutputField,
        request: &AttributeRequest,
        value: AttributeValue,
    ) -> Result<Value> {
        let ty = field.ty();
        let null_violation = || Error::NullViolation {
            entity: entity.to_string(),
            attribute: field.name().to_string(),
        };

        if !ty.is_list() {
            if value.is_null() || !self.keep(field, request, &value) {
                return if ty.is_non_null() { Err(null_violation()) } else { Ok(Value::Null) };
            }
            return self.element(entity, field, request, value);
        }

        let items = match value {
            AttributeValue::Null => Vec::new(),
            AttributeValue::List(items) => items,
            single => vec![single],
        };
        let items: Vec<_> = items
            .into_iter()
            .filter(|item| self.keep(field, request, item))
            .collect();
        let items = match request.window() {
            Some(window) => window.slice(items),
            None => items,
        };
        items
            .into_iter()
            .map(|item| {
                if !item.is_null() {
                    self.element(entity, field, request, item)
                } else if ty.is_element_non_null() {
                    Err(null_violation())
                } else {
                    Ok(Value::Null)
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    /// Apply the attribute's nested filter to one value.
    fn keep(&self, field: &OutputField, request: &AttributeRequest, value: &AttributeValue) -> bool {
        let groups = request.filter();
        if groups.is_empty() {
            return true;
        }
        match field.target() {
            OutputTarget::Scalar(_) => self.matcher.matches_scalar(value, groups),
            OutputTarget::Object(object) => match value.as_record() {
                Some(record) => self
                    .matcher
                    .matches(EntityValue::new(object.definition(), &**record), groups),
                None => false,
            },
        }
    }

    fn element(&self, entity: &str, field: &OutputField, request: &AttributeRequest, value: AttributeValue) -> Result<Value> {
        match field.target() {
            OutputTarget::Scalar(kind) => scalar(*kind, &value).ok_or_else(|| {
                Error::DataSource(anyhow!(
                    "{entity}.{} holds {value:?}, which is not a valid {kind}",
                    field.name()
                ))
            }),
            OutputTarget::Object(_) => {
                let Some(record) = value.as_record() else {
                    return Err(Error::DataSource(anyhow!(
                        "{entity}.{} holds {value:?} where a record was expected",
                        field.name()
                    )));
                };
                match request.nested() {
                    Some(nested) => self.record(nested, &**record),
                    None => Ok(Value::Object(Map::new())),
                }
            }
        }
    }
}

/// Coerce a stored value to the JSON form of a scalar.
fn scalar(kind: ScalarKind, value: &AttributeValue) -> Option<Value> {
    match (kind, value) {
        (ScalarKind::String | ScalarKind::Id, AttributeValue::String(s)) => Some(Value::String(s.clone())),
        (ScalarKind::String | ScalarKind::Id, AttributeValue::Int(i)) => Some(Value::String(i.to_string())),
        (ScalarKind::String, AttributeValue::Float(x)) => Some(Value::String(x.to_string())),
        (ScalarKind::String, AttributeValue::Boolean(b)) => Some(Value::String(b.to_string())),
        (ScalarKind::Int, AttributeValue::Int(i)) => Some(Value::from(*i)),
        (ScalarKind::Int, AttributeValue::Float(x)) => exact_int(*x).map(Value::from),
        (ScalarKind::Int, AttributeValue::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (ScalarKind::Float, AttributeValue::Int(i)) => Number::from_f64(*i as f64).map(Value::Number),
        (ScalarKind::Float, AttributeValue::Float(x)) => Number::from_f64(*x).map(Value::Number),
        (ScalarKind::Float, AttributeValue::String(s)) => {
            s.trim().parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
        }
        (ScalarKind::Boolean, AttributeValue::Boolean(b)) => Some(Value::Bool(*b)),
        (ScalarKind::Boolean, AttributeValue::Int(i)) => Some(Value::Bool(*i != 0)),
        _ => None,
    }
}

/// The integer a float holds exactly, if it is one within `i64` range.
fn exact_int(x: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (x.fract() == 0.0 && (-LIMIT..LIMIT).contains(&x)).then_some(x as i64)
}
