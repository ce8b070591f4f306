//! Configuration file support for research-gap.
//!
//! Settings are read from a TOML file and can be overridden with
//! environment variables prefixed `RESEARCH_GAP`, using `__` between
//! section and key (`RESEARCH_GAP_PIPELINE__TOP_ARTICLES=3`).
//!
//! # Configuration File Format
//!
//! ```toml
//! [ncbi]
//! api_key = "your-ncbi-key"
//! email = "you@example.org"
//!
//! [llm]
//! model = "gpt-4o-mini"
//! max_concurrent = 4
//!
//! [pipeline]
//! max_search_results = 20
//! full_text_candidates = 10
//! top_articles = 5
//!
//! [rate_limits]
//! requests_per_second = 3.0
//! max_concurrent_requests = 10
//! request_timeout_secs = 60
//!
//! [retry]
//! metadata_attempts = 3
//! full_text_attempts = 5
//! gap_attempts = 3
//!
//! [storage]
//! directory = "./research_articles"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "research-gap.toml";

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

impl From<config::ConfigError> for ConfigFileError {
    fn from(err: config::ConfigError) -> Self {
        ConfigFileError::Parse(err.to_string())
    }
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigFileError> {
    if !path.exists() {
        return Err(ConfigFileError::Io(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix("RESEARCH_GAP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Find a configuration file in the default locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("research-gap").join("config.toml"))
        .filter(|path| path.is_file())
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}
