use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub logging_level: Option<String>,

    pub notices: Option<NoticesConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct NoticesConfig {
    pub notices_option_key: Option<String>,
    pub groups_option_key: Option<String>,
    pub nonce_lifespan_secs: Option<u64>,
    // Query parameter names
    pub screen_param: Option<String>,
    pub dismiss_param: Option<String>,
    pub nonce_param: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
