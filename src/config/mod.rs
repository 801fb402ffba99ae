mod file_config;

pub use file_config::{FileConfig, NoticesConfig};

use crate::notices::NoticeSettings;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LoggingLevel::Error => LevelFilter::ERROR,
            LoggingLevel::Warn => LevelFilter::WARN,
            LoggingLevel::Info => LevelFilter::INFO,
            LoggingLevel::Debug => LevelFilter::DEBUG,
            LoggingLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub logging_level: LoggingLevel,
    pub nonce_lifespan_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub logging_level: LoggingLevel,
    pub notices: NoticeSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified on the command line or in config file")
            })?;

        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or(cli.logging_level);

        let defaults = NoticeSettings::default();
        let notices_file = file.notices.unwrap_or_default();
        let notices = NoticeSettings {
            notices_option_key: notices_file
                .notices_option_key
                .unwrap_or(defaults.notices_option_key),
            groups_option_key: notices_file
                .groups_option_key
                .unwrap_or(defaults.groups_option_key),
            nonce_lifespan_secs: notices_file
                .nonce_lifespan_secs
                .or(cli.nonce_lifespan_secs)
                .unwrap_or(defaults.nonce_lifespan_secs),
            screen_param: notices_file.screen_param.unwrap_or(defaults.screen_param),
            dismiss_param: notices_file.dismiss_param.unwrap_or(defaults.dismiss_param),
            nonce_param: notices_file.nonce_param.unwrap_or(defaults.nonce_param),
        };

        if notices.notices_option_key.is_empty() || notices.groups_option_key.is_empty() {
            bail!("Notice option keys must not be empty");
        }
        if notices.notices_option_key == notices.groups_option_key {
            bail!(
                "notices_option_key and groups_option_key must differ (both are {:?})",
                notices.notices_option_key
            );
        }
        if notices.nonce_lifespan_secs < 2 {
            bail!(
                "nonce_lifespan_secs must be at least 2, got {}",
                notices.nonce_lifespan_secs
            );
        }
        for (name, value) in [
            ("screen_param", &notices.screen_param),
            ("dismiss_param", &notices.dismiss_param),
            ("nonce_param", &notices.nonce_param),
        ] {
            if value.is_empty() {
                bail!("{} must not be empty", name);
            }
        }

        Ok(Self {
            db_path,
            logging_level,
            notices,
        })
    }
}

/// Parses a logging level string into LoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<LoggingLevel> {
    LoggingLevel::from_str(s, true).ok()
}
