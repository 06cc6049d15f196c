//! Application configuration management

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::graphql::PageDefaults;
use crate::services::LogFormat;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (for generating URLs)
    pub host: Option<String>,

    /// Server port
    pub port: u16,

    /// JSON fixture loaded into the in-memory data source
    pub data_path: PathBuf,

    /// Page size of root list fields when `limit` is omitted
    pub default_page_size: usize,

    /// Upper bound on `limit` for root list fields
    pub max_page_size: usize,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from any variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let default_page_size: usize = var("DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|| "25".to_string())
            .parse()
            .context("Invalid DEFAULT_PAGE_SIZE")?;
        let max_page_size: usize = var("MAX_PAGE_SIZE")
            .unwrap_or_else(|| "100".to_string())
            .parse()
            .context("Invalid MAX_PAGE_SIZE")?;
        if default_page_size == 0 || default_page_size > max_page_size {
            bail!("DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE ({max_page_size})");
        }

        Ok(Self {
            host: var("HOST"),

            port: var("PORT")
                .unwrap_or_else(|| "3001".to_string())
                .parse()
                .context("Invalid PORT")?,

            data_path: var("DATA_PATH")
                .unwrap_or_else(|| "./data/storefront.json".to_string())
                .into(),

            default_page_size,
            max_page_size,

            log_format: var("LOG_FORMAT")
                .map(|v| v.parse::<LogFormat>())
                .transpose()
                .context("Invalid LOG_FORMAT")?
                .unwrap_or_default(),
        })
    }

    pub fn pages(&self) -> PageDefaults {
        PageDefaults {
            default_limit: self.default_page_size,
            max_limit: self.max_page_size,
        }
    }

    /// Base URL used in startup logs.
    pub fn public_url(&self) -> String {
        let host = self.host.as_deref().unwrap_or("localhost");
        format!("http://{host}:{}", self.port)
    }
}
