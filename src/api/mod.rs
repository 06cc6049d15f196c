//! HTTP route definitions
//!
//! The API is GraphQL at /graphql. The schema text and a health check are
//! served alongside it.

pub mod graphql;
pub mod health;
