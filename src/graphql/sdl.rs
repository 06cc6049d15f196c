//! Schema definition language rendering
//!
//! Only types reachable from the root fields are printed. Output is
//! deterministic: root types first, then objects, inputs and entity filters
//! sorted by name, then the scalar filters and the `AnyAll` enum.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::catalog::ScalarKind;
use crate::error::SchemaError;

use super::filters::{AnyAll, CHILDREN_KEY, JOIN_KEY};
use super::pagination::PageDefaults;
use super::registry::{
    Argument, FilterTarget, FilterType, InputObjectType, InputTarget, ObjectType, OutputTarget, TypeRegistry,
};
use super::roots::{OperationKind, RootAction, RootFields};

const INDENT: &str = "  ";

impl TypeRegistry {
    /// Render the schema reachable from `roots`.
    pub fn sdl(&self, roots: &RootFields, pages: PageDefaults) -> Result<String, SchemaError> {
        SchemaPrinter::new(self, roots, pages).print()
    }
}

/// Types collected while walking out from the root fields.
#[derive(Default)]
pub(crate) struct Reachable {
    pub objects: BTreeMap<String, Arc<ObjectType>>,
    pub inputs: BTreeMap<String, Arc<InputObjectType>>,
    pub filters: BTreeMap<String, Arc<FilterType>>,
}

impl Reachable {
    pub fn collect(registry: &TypeRegistry, roots: &RootFields) -> Result<Self, SchemaError> {
        let mut reachable = Reachable::default();
        let mut objects = Vec::new();
        let mut inputs = Vec::new();
        let mut filters = Vec::new();

        for kind in [OperationKind::Query, OperationKind::Mutation] {
            for field in roots.fields(kind) {
                objects.push(registry.object_type(field.entity())?);
                match field.action() {
                    RootAction::Search => filters.push(registry.filter_type(field.entity())?),
                    RootAction::Create { .. } => inputs.push(registry.input_type(field.entity())?),
                    RootAction::Lookup { .. } => {}
                }
            }
        }

        while let Some(object) = objects.pop() {
            if reachable.objects.contains_key(object.name()) {
                continue;
            }
            for field in object.fields(registry)?.values() {
                if let OutputTarget::Object(target) = field.target() {
                    objects.push(target.clone());
                    if field.accepts("filter") {
                        filters.push(registry.filter_type(target.name())?);
                    }
                }
            }
            reachable.objects.insert(object.name().to_string(), object);
        }

        while let Some(input) = inputs.pop() {
            if reachable.inputs.contains_key(input.name()) {
                continue;
            }
            for field in input.fields(registry)?.values() {
                if let InputTarget::Object(target) = field.target() {
                    inputs.push(target.clone());
                }
            }
            reachable.inputs.insert(input.name().to_string(), input);
        }

        while let Some(filter) = filters.pop() {
            if reachable.filters.contains_key(filter.name()) {
                continue;
            }
            for field in filter.fields(registry)?.values() {
                if let FilterTarget::Entity(target) = field.target() {
                    filters.push(target.clone());
                }
            }
            reachable.filters.insert(filter.name().to_string(), filter);
        }

        Ok(reachable)
    }
}

/// One `type`, `input` or `enum` definition ready to print.
struct Block {
    keyword: &'static str,
    name: String,
    description: String,
    lines: Vec<Line>,
}

/// A field, input field or enum value. Enum values have no type.
struct Line {
    description: String,
    name: String,
    arguments: String,
    ty: Option<String>,
}

impl Block {
    fn new(keyword: &'static str, name: impl Into<String>) -> Self {
        Self {
            keyword,
            name: name.into(),
            description: String::new(),
            lines: Vec::new(),
        }
    }

    fn described(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    fn line(mut self, name: impl Into<String>, ty: impl ToString) -> Self {
        self.lines.push(Line {
            description: String::new(),
            name: name.into(),
            arguments: String::new(),
            ty: Some(ty.to_string()),
        });
        self
    }

    fn field(mut self, description: &str, name: &str, arguments: &[Argument], ty: impl ToString) -> Self {
        self.lines.push(Line {
            description: description.to_string(),
            name: name.to_string(),
            arguments: render_arguments(arguments),
            ty: Some(ty.to_string()),
        });
        self
    }

    fn value(mut self, name: &str) -> Self {
        self.lines.push(Line {
            description: String::new(),
            name: name.to_string(),
            arguments: String::new(),
            ty: None,
        });
        self
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_description(f, "", &self.description)?;
        writeln!(f, "{} {} {{", self.keyword, self.name)?;
        for line in &self.lines {
            write_description(f, INDENT, &line.description)?;
            write!(f, "{INDENT}{}{}", line.name, line.arguments)?;
            match &line.ty {
                Some(ty) => writeln!(f, ": {ty}")?,
                None => writeln!(f)?,
            }
        }
        writeln!(f, "}}")
    }
}

pub struct SchemaPrinter<'a> {
    registry: &'a TypeRegistry,
    roots: &'a RootFields,
    pages: PageDefaults,
}

impl<'a> SchemaPrinter<'a> {
    pub fn new(registry: &'a TypeRegistry, roots: &'a RootFields, pages: PageDefaults) -> Self {
        Self { registry, roots, pages }
    }

    pub fn print(&self) -> Result<String, SchemaError> {
        let blocks = self.blocks()?;
        Ok(blocks
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn blocks(&self) -> Result<Vec<Block>, SchemaError> {
        let reachable = Reachable::collect(self.registry, self.roots)?;
        let mut blocks = Vec::new();

        for kind in [OperationKind::Query, OperationKind::Mutation] {
            let mut fields = self.roots.fields(kind).peekable();
            if fields.peek().is_none() {
                continue;
            }
            let block = fields.fold(Block::new("type", kind.type_name()), |block, field| {
                block.field(
                    field.description(),
                    field.name(),
                    &field.arguments(self.pages),
                    field.return_type(),
                )
            });
            blocks.push(block);
        }

        for object in reachable.objects.values() {
            let mut block = Block::new("type", object.name()).described(object.definition().description());
            for field in object.fields(self.registry)?.values() {
                block = block.field(field.attribute().description(), field.name(), field.arguments(), field.ty());
            }
            blocks.push(block);
        }

        for input in reachable.inputs.values() {
            let mut block = Block::new("input", input.name());
            for field in input.fields(self.registry)?.values() {
                block = block.line(field.name(), field.ty());
            }
            blocks.push(block);
        }

        for filter in reachable.filters.values() {
            let mut block = Block::new("input", filter.name())
                .line(JOIN_KEY, AnyAll::TYPE_NAME)
                .line(CHILDREN_KEY, format!("[{}!]", filter.name()));
            for field in filter.fields(self.registry)?.values() {
                block = block.line(field.name(), field.target().type_name());
            }
            blocks.push(block);
        }

        for kind in ScalarKind::ALL {
            let scalar = self.registry.scalar_filter(kind);
            let block = scalar
                .operators()
                .iter()
                .fold(Block::new("input", scalar.name()), |block, operator| {
                    block.line(operator.key(), operator.operand_type(kind))
                });
            blocks.push(block);
        }

        blocks.push(
            Block::new("enum", AnyAll::TYPE_NAME)
                .value(AnyAll::Any.name())
                .value(AnyAll::All.name()),
        );
        Ok(blocks)
    }
}

fn render_arguments(arguments: &[Argument]) -> String {
    if arguments.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = arguments
        .iter()
        .map(|argument| match &argument.default {
            Some(default) => format!("{}: {} = {default}", argument.name, argument.ty),
            None => format!("{}: {}", argument.name, argument.ty),
        })
        .collect();
    format!("({})", rendered.join(", "))
}

fn write_description(f: &mut fmt::Formatter<'_>, indent: &str, text: &str) -> fmt::Result {
    if text.is_empty() {
        return Ok(());
    }
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    writeln!(f, "{indent}\"{escaped}\"")
}
