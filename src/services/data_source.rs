//! Data Source Trait
//!
//! The interface the executor fetches records through. Implementations own
//! storage; the executor only sees [`Record`]s and reads them through the
//! catalog.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::catalog::Record;
use crate::graphql::filters::FilterGroup;
use crate::graphql::pagination::Page;

/// Fetches and stores records of catalog entities.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// One record by `id`, `None` when it does not exist.
    async fn fetch_by_id(&self, entity: &str, id: &str) -> Result<Option<Arc<dyn Record>>>;

    /// One record by a unique key attribute such as a product's `sku`.
    async fn fetch_by_key(&self, entity: &str, attribute: &str, key: &str) -> Result<Option<Arc<dyn Record>>>;

    /// Records matching every group of `filter`, windowed by `page`.
    async fn search(&self, entity: &str, filter: &[FilterGroup], page: Page) -> Result<Vec<Arc<dyn Record>>>;

    /// Store a new record built from validated input and return it.
    async fn create(&self, entity: &str, input: Map<String, Value>) -> Result<Arc<dyn Record>>;
}
