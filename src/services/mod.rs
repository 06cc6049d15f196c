//! Data access, HTTP serving and process setup

pub mod data_source;
pub mod http_server;
pub mod logging;
pub mod memory;

pub use data_source::DataSource;
pub use http_server::serve;
pub use logging::{LogFormat, init_tracing};
pub use memory::InMemoryDataSource;
