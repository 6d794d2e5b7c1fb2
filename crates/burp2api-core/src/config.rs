//! Configuration management for burp2api conversions.
//!
//! This module defines the `Config` struct that controls where outputs are
//! written and how the generated OpenAPI document is labelled. The
//! configuration can be loaded from a YAML file or created programmatically.
//!
//! # Examples
//!
//! ```no_run
//! use burp2api_core::config::Config;
//!
//! // Create a config programmatically
//! let mut config = Config::default();
//! config.output_dir = "build/openapi".to_string();
//!
//! // Or load from a config file
//! # async fn load() -> burp2api_core::Result<()> {
//! let config = Config::from_file("burp2api.yaml").await?;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::Path;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use tokio::fs;
use url::Url;

/// Configuration for a burp2api conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory that receives the OpenAPI JSON and the normalized XML
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Prefix placed before the derived API name in `info.title`
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,

    /// Text used for `info.description`
    #[serde(default = "default_description")]
    pub description: String,

    /// Value of `info.version`
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Value of the top-level `openapi` field
    #[serde(default = "default_openapi_version")]
    pub openapi_version: String,

    /// Server URL to publish instead of the one derived from the traffic (Optional)
    #[serde(default)]
    pub server_url: Option<Url>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            title_prefix: default_title_prefix(),
            description: default_description(),
            api_version: default_api_version(),
            openapi_version: default_openapi_version(),
            server_url: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_title_prefix() -> String {
    "Burp2API - ".to_string()
}

fn default_description() -> String {
    "This API has been reconstructed from Burp Suite proxy history with burp2api.".to_string()
}

fn default_api_version() -> String {
    "1.0.0".to_string()
}

fn default_openapi_version() -> String {
    "3.0.0".to_string()
}
