//! Selection sets to request trees
//!
//! Fragment spreads and inline fragments are expanded into the entity scope
//! they appear in. Type conditions on fragments are not checked. `@skip` and
//! `@include` are honored on fields and fragments.

use std::collections::HashMap;

use async_graphql::parser::Positioned;
use async_graphql::parser::types::{
    Directive, ExecutableDocument, Field, FragmentDefinition, Selection, SelectionSet,
};
use async_graphql::{Name, Value as ConstValue, Variables};
use indexmap::IndexMap;
use tracing::debug;

use crate::catalog::{EntityCatalog, EntityDefinition};
use crate::error::{Error, Result, SchemaError};

use super::filters::FilterCompiler;
use super::pagination::parse_window_args;
use super::request::{AttributeRequest, EntityRequest};
use super::wrapping::TypeString;

pub const TYPENAME_FIELD: &str = "__typename";

/// Builds [`EntityRequest`]s for the root fields of one operation.
pub struct QueryPlanner<'a> {
    catalog: &'a EntityCatalog,
    fragments: &'a HashMap<Name, Positioned<FragmentDefinition>>,
    variables: &'a Variables,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(catalog: &'a EntityCatalog, document: &'a ExecutableDocument, variables: &'a Variables) -> Self {
        Self {
            catalog,
            fragments: &document.fragments,
            variables,
        }
    }

    /// Build the request tree for a field returning `return_type` (a type
    /// string such as `[Product!]!`).
    pub fn plan(&self, return_type: &str, selection_set: &SelectionSet) -> Result<EntityRequest> {
        let ty = TypeString::parse(return_type)?;
        let definition = self.catalog.require(ty.name())?;
        let mut request = EntityRequest::new(definition.clone());
        self.walk(&mut request, selection_set, &mut Vec::new())?;
        debug!(request = %request, "Built request tree");
        Ok(request)
    }

    /// Root-level fields with fragments expanded and skipped fields removed.
    pub fn root_fields<'s>(&self, selection_set: &'s SelectionSet) -> Result<Vec<&'s Positioned<Field>>>
    where
        'a: 's,
    {
        let mut fields = Vec::new();
        self.collect_root_fields(selection_set, &mut fields, &mut Vec::new())?;
        Ok(fields)
    }

    /// Field arguments with variables substituted. Undefined variables read as null.
    pub fn arguments(&self, field: &Field) -> Result<IndexMap<String, ConstValue>> {
        field
            .arguments
            .iter()
            .map(|(name, value)| {
                let value = value.node.clone().into_const_with(|variable| {
                    Ok::<_, Error>(self.variables.get(&variable).cloned().unwrap_or(ConstValue::Null))
                })?;
                Ok((name.node.to_string(), value))
            })
            .collect()
    }

    fn collect_root_fields<'s>(
        &self,
        selection_set: &'s SelectionSet,
        fields: &mut Vec<&'s Positioned<Field>>,
        visiting: &mut Vec<Name>,
    ) -> Result<()>
    where
        'a: 's,
    {
        for selection in &selection_set.items {
            match &selection.node {
                Selection::Field(field) => {
                    if !self.is_skipped(&field.node.directives)? {
                        fields.push(field);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if self.is_skipped(&spread.node.directives)? {
                        continue;
                    }
                    let fragment = self.enter_fragment(&spread.node.fragment_name.node, visiting)?;
                    self.collect_root_fields(&fragment.node.selection_set.node, fields, visiting)?;
                    visiting.pop();
                }
                Selection::InlineFragment(inline) => {
                    if !self.is_skipped(&inline.node.directives)? {
                        self.collect_root_fields(&inline.node.selection_set.node, fields, visiting)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn walk(&self, request: &mut EntityRequest, selection_set: &SelectionSet, visiting: &mut Vec<Name>) -> Result<()> {
        for selection in &selection_set.items {
            match &selection.node {
                Selection::Field(field) => {
                    if self.is_skipped(&field.node.directives)? {
                        continue;
                    }
                    reject_alias(&field.node)?;
                    if field.node.name.node.as_str() == TYPENAME_FIELD {
                        request.request_typename();
                        continue;
                    }
                    let definition = request.definition().clone();
                    let attribute = self.plan_field(&definition, &field.node, visiting)?;
                    request.add(attribute)?;
                }
                Selection::FragmentSpread(spread) => {
                    if self.is_skipped(&spread.node.directives)? {
                        continue;
                    }
                    let fragment = self.enter_fragment(&spread.node.fragment_name.node, visiting)?;
                    self.walk(request, &fragment.node.selection_set.node, visiting)?;
                    visiting.pop();
                }
                Selection::InlineFragment(inline) => {
                    if !self.is_skipped(&inline.node.directives)? {
                        self.walk(request, &inline.node.selection_set.node, visiting)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn plan_field(
        &self,
        definition: &EntityDefinition,
        field: &Field,
        visiting: &mut Vec<Name>,
    ) -> Result<AttributeRequest> {
        let name = field.name.node.as_str();
        let attribute = definition
            .attribute(name)
            .ok_or_else(|| SchemaError::UnknownAttribute {
                entity: definition.name().to_string(),
                attribute: name.to_string(),
            })?
            .clone();

        let mut start = None;
        let mut limit = None;
        let mut filter = ConstValue::Null;
        for (argument, value) in self.arguments(field)? {
            match argument.as_str() {
                "start" | "limit" if !attribute.is_repeating() => {}
                "start" => start = int_argument(name, "start", &value)?,
                "limit" => limit = int_argument(name, "limit", &value)?,
                "filter" if attribute.is_repeating() || !attribute.is_scalar() => filter = value,
                _ => {
                    return Err(Error::InvalidArgument {
                        field: name.to_string(),
                        argument,
                        reason: "unknown argument".to_string(),
                    });
                }
            }
        }
        let window = parse_window_args(start, limit).map_err(|reason| Error::InvalidArgument {
            field: name.to_string(),
            argument: "start/limit".to_string(),
            reason,
        })?;

        let compiler = FilterCompiler::new(self.catalog);
        let selection = &field.selection_set.node;
        let request = match attribute.scalar_kind() {
            Some(kind) => {
                if !selection.items.is_empty() {
                    return Err(SchemaError::ScalarSelection {
                        entity: definition.name().to_string(),
                        attribute: name.to_string(),
                    }
                    .into());
                }
                AttributeRequest::new(attribute.clone()).with_filter(compiler.compile_scalar(kind, &filter)?)
            }
            None => {
                let target = self.catalog.require(attribute.type_name())?;
                let groups = compiler.compile(target, &filter)?;
                let mut request = AttributeRequest::new(attribute.clone()).with_filter(groups);
                if !selection.items.is_empty() {
                    let mut nested = EntityRequest::new(target.clone());
                    self.walk(&mut nested, selection, visiting)?;
                    request = request.with_nested(nested);
                }
                request
            }
        };
        Ok(request.with_window(window))
    }

    fn enter_fragment(&self, name: &Name, visiting: &mut Vec<Name>) -> Result<&'a Positioned<FragmentDefinition>> {
        let fragment = self
            .fragments
            .get(name)
            .ok_or_else(|| Error::Syntax(format!("unknown fragment '{name}'")))?;
        if visiting.contains(name) {
            return Err(Error::Syntax(format!("fragment '{name}' spreads itself")));
        }
        visiting.push(name.clone());
        Ok(fragment)
    }

    /// Evaluate `@skip(if:)` and `@include(if:)`.
    fn is_skipped(&self, directives: &[Positioned<Directive>]) -> Result<bool> {
        for directive in directives {
            let skip_when = match directive.node.name.node.as_str() {
                "skip" => true,
                "include" => false,
                _ => continue,
            };
            let condition = directive
                .node
                .arguments
                .iter()
                .find(|(name, _)| name.node.as_str() == "if")
                .map(|(_, value)| {
                    value.node.clone().into_const_with(|variable| {
                        Ok::<_, Error>(self.variables.get(&variable).cloned().unwrap_or(ConstValue::Null))
                    })
                })
                .transpose()?;
            match condition {
                Some(ConstValue::Boolean(flag)) if flag == skip_when => return Ok(true),
                Some(ConstValue::Boolean(_)) => {}
                _ => {
                    return Err(Error::InvalidArgument {
                        field: format!("@{}", directive.node.name.node),
                        argument: "if".to_string(),
                        reason: "expected a Boolean".to_string(),
                    });
                }
            }
        }
        Ok(false)
    }
}

pub(crate) fn reject_alias(field: &Field) -> Result<()> {
    match &field.alias {
        Some(alias) => Err(Error::UnsupportedOperation(format!(
            "field aliases are not supported ('{}: {}')",
            alias.node, field.name.node
        ))),
        None => Ok(()),
    }
}

pub(crate) fn int_argument(field: &str, argument: &str, value: &ConstValue) -> Result<Option<i64>> {
    match value {
        ConstValue::Null => Ok(None),
        ConstValue::Number(n) => n.as_i64().map(Some).ok_or_else(|| Error::InvalidArgument {
            field: field.to_string(),
            argument: argument.to_string(),
            reason: "expected an Int".to_string(),
        }),
        _ => Err(Error::InvalidArgument {
            field: field.to_string(),
            argument: argument.to_string(),
            reason: "expected an Int".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::parser::parse_query;
    use async_graphql::parser::types::DocumentOperations;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::catalog::{AttributeDefinition, ScalarKind};
    use crate::graphql::pagination::Window;

    fn catalog() -> EntityCatalog {
        let s = |name: &str| AttributeDefinition::scalar(name, "", ScalarKind::String, true);
        EntityCatalog::new([
            EntityDefinition::new(
                "T",
                "",
                [
                    s("a"),
                    AttributeDefinition::entity("b", "", "B", false, true),
                    s("e"),
                    s("f"),
                    AttributeDefinition::entity("list", "", "B", true, false),
                ],
            ),
            EntityDefinition::new("B", "", [s("c"), s("d")]),
        ])
        .unwrap()
    }

    fn plan_with(query: &str, variables: serde_json::Value) -> Result<EntityRequest> {
        let catalog = catalog();
        let document = parse_query(query).unwrap();
        let variables = Variables::from_json(variables);
        let planner = QueryPlanner::new(&catalog, &document, &variables);
        let selection_set = match &document.operations {
            DocumentOperations::Single(op) => &op.node.selection_set.node,
            DocumentOperations::Multiple(ops) => &ops.values().next().unwrap().node.selection_set.node,
        };
        planner.plan("T!", selection_set)
    }

    fn plan(query: &str) -> Result<EntityRequest> {
        plan_with(query, json!({}))
    }

    #[test]
    fn test_request_tree_shape() {
        let request = plan("{ a b { c d } }").unwrap();
        let names: Vec<_> = request.attributes().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        let nested = request.attribute("b").unwrap().nested().unwrap();
        let nested_names: Vec<_> = nested.attributes().map(|a| a.name().to_string()).collect();
        assert_eq!(nested_names, vec!["c", "d"]);
        assert!(request.attribute("a").unwrap().nested().is_none());
        assert_eq!(request.to_string(), "T[a b:B[c d]]");
    }

    #[test]
    fn test_fragment_expansion_matches_inline_fields() {
        let inlined = plan("{ a e f }").unwrap();
        let spread = plan("query { a ...FragName } fragment FragName on T { e f }").unwrap();
        let inline_fragment = plan("{ a ... on T { e f } }").unwrap();
        assert_eq!(spread, inlined);
        assert_eq!(inline_fragment, inlined);
    }

    #[test]
    fn test_unknown_field() {
        assert_matches!(
            plan("{ a nope }"),
            Err(Error::Schema(SchemaError::UnknownAttribute { entity, attribute }))
                if entity == "T" && attribute == "nope"
        );
    }

    #[test]
    fn test_unknown_entity_names_the_entity() {
        let catalog = catalog();
        let document = parse_query("{ a }").unwrap();
        let variables = Variables::default();
        let planner = QueryPlanner::new(&catalog, &document, &variables);
        let DocumentOperations::Single(op) = &document.operations else {
            unreachable!()
        };
        assert_matches!(
            planner.plan("[Widget!]!", &op.node.selection_set.node),
            Err(Error::Schema(SchemaError::UnknownEntity { entity })) if entity == "Widget"
        );
    }

    #[test]
    fn test_window_and_variables() {
        let request = plan_with(
            "query Q($n: Int) { list(start: 1, limit: $n) { c } a(start: 5) }",
            json!({ "n": 2 }),
        )
        .unwrap();
        assert_eq!(
            request.attribute("list").unwrap().window(),
            Some(Window { start: 1, limit: Some(2) })
        );
        assert_eq!(request.attribute("a").unwrap().window(), None);
    }

    #[test]
    fn test_duplicate_fields_merge_or_conflict() {
        let merged = plan("{ b { c } ...F } fragment F on T { b { d } }").unwrap();
        assert_eq!(merged.attribute("b").unwrap().nested().unwrap().len(), 2);

        assert_matches!(
            plan("{ list(limit: 1) { c } ...F } fragment F on T { list(limit: 2) { c } }"),
            Err(Error::Schema(SchemaError::ConflictingArguments { attribute, .. })) if attribute == "list"
        );
    }

    #[test]
    fn test_nested_filter_is_compiled() {
        let request = plan(r#"{ list(filter: { c: { eq: "x" } }) { c } }"#).unwrap();
        let filter = request.attribute("list").unwrap().filter();
        assert_eq!(filter.len(), 1);
        assert_eq!(filter[0].constraints[0].field, "c");
    }

    #[test]
    fn test_non_scalar_without_selection_is_allowed() {
        let request = plan("{ b }").unwrap();
        assert!(request.attribute("b").unwrap().nested().is_none());
    }

    #[test]
    fn test_rejected_shapes() {
        assert_matches!(plan("{ x: a }"), Err(Error::UnsupportedOperation(_)));
        assert_matches!(
            plan("{ a { c } }"),
            Err(Error::Schema(SchemaError::ScalarSelection { .. }))
        );
        assert_matches!(plan("{ ...Missing }"), Err(Error::Syntax(_)));
        assert_matches!(
            plan("{ ...A } fragment A on T { b { ...A } }"),
            Err(Error::Syntax(message)) if message.contains("spreads itself")
        );
        assert_matches!(plan("{ a(sort: 1) }"), Err(Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_skip_and_include() {
        let request = plan_with(
            "query Q($hide: Boolean!) { a @skip(if: $hide) e @include(if: false) f __typename }",
            json!({ "hide": true }),
        )
        .unwrap();
        let names: Vec<_> = request.attributes().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["f"]);
        assert!(request.wants_typename());
    }
}
