//! Dynamic GraphQL layer over the entity catalog
//!
//! Types are compiled from catalog entities at runtime rather than declared
//! in Rust. A query is parsed with async-graphql's parser, planned into a
//! request tree per root field and executed against a
//! [`DataSource`](crate::services::DataSource). Responses use async-graphql's
//! `Response` envelope.

pub mod executor;
pub mod filters;
pub mod input;
pub mod introspection;
pub mod pagination;
pub mod planner;
pub mod registry;
pub mod request;
pub mod roots;
pub mod sdl;
pub mod wrapping;

pub use executor::Executor;
pub use filters::{AnyAll, Condition, Constraint, FilterCompiler, FilterGroup, FilterMatcher, Operand, Operator};
pub use pagination::{Page, PageDefaults, Window};
pub use planner::QueryPlanner;
pub use registry::{FilterType, InputObjectType, ObjectType, TypeRegistry};
pub use request::{AttributeRequest, EntityRequest};
pub use roots::{OperationKind, RootAction, RootField, RootFields};
pub use wrapping::TypeString;
