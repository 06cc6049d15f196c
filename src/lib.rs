//! Storefront GraphQL: a GraphQL endpoint generated at runtime from an
//! entity catalog.
//!
//! Entities are described as data in [`catalog`]. The [`graphql`] layer
//! compiles them into output, input and filter types, plans incoming
//! selection sets into request trees and executes them against a
//! [`services::DataSource`].

pub mod api;
pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod graphql;
pub mod services;

pub use app::{AppState, build_app};
pub use error::{Error, FilterError, Result, SchemaError};
