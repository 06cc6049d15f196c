//! Storefront GraphQL server
//!
//! Loads the storefront catalog and a JSON fixture, then serves the generated
//! schema at /graphql.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use storefront_graphql::app::AppState;
use storefront_graphql::catalog::EntityCatalog;
use storefront_graphql::config::Config;
use storefront_graphql::graphql::{Executor, RootFields, TypeRegistry};
use storefront_graphql::services::{InMemoryDataSource, init_tracing, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);
    init_tracing(config.log_format)?;

    info!("Starting Storefront GraphQL");

    let catalog = Arc::new(EntityCatalog::storefront().context("Invalid storefront catalog")?);
    let registry = Arc::new(TypeRegistry::new(catalog.clone()));
    registry.compile_all().context("Failed to compile schema types")?;
    info!(entities = catalog.names().count(), "Schema types compiled");

    let data_source = InMemoryDataSource::storefront(catalog);
    let records = data_source
        .load_file(&config.data_path)
        .await
        .with_context(|| format!("Failed to load {}", config.data_path.display()))?;
    info!(records, path = %config.data_path.display(), "Data loaded");

    let executor = Arc::new(Executor::new(
        registry,
        RootFields::storefront(),
        Arc::new(data_source),
        config.pages(),
    ));
    executor.sdl().context("Failed to render schema")?;
    executor.introspection().context("Failed to build introspection schema")?;

    serve(AppState { config, executor }).await
}
