use std::env;

use anyhow::{Context, Result};

pub const DEFAULT_SEARCH_API_URL: &str = "https://api.tavily.com";
pub const DEFAULT_COMPLETION_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ZIP_TABLE_PATH: &str = "data/zip_directory.csv";
pub const DEFAULT_ASSESSOR_DOMAIN: &str = "gis.vgsi.com";

/// Process configuration read from the environment.
///
/// Missing API keys are a fatal startup condition; everything else has a
/// default.
#[derive(Debug, Clone)]
pub struct Config {
    pub search_api_key: String,
    pub search_api_url: String,
    pub completion_api_key: String,
    pub completion_api_url: String,
    pub completion_model: String,
    pub zip_table_path: String,
    pub assessor_domain: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            search_api_key: env::var("SEARCH_API_KEY")
                .context("SEARCH_API_KEY must be set")?,
            search_api_url: env::var("SEARCH_API_URL")
                .unwrap_or_else(|_| DEFAULT_SEARCH_API_URL.to_string()),
            completion_api_key: env::var("COMPLETION_API_KEY")
                .context("COMPLETION_API_KEY must be set")?,
            completion_api_url: env::var("COMPLETION_API_URL")
                .unwrap_or_else(|_| DEFAULT_COMPLETION_API_URL.to_string()),
            completion_model: env::var("COMPLETION_MODEL")
                .unwrap_or_else(|_| DEFAULT_COMPLETION_MODEL.to_string()),
            zip_table_path: env::var("ZIP_TABLE_PATH")
                .unwrap_or_else(|_| DEFAULT_ZIP_TABLE_PATH.to_string()),
            assessor_domain: env::var("ASSESSOR_DOMAIN")
                .unwrap_or_else(|_| DEFAULT_ASSESSOR_DOMAIN.to_string()),
        })
    }
}
