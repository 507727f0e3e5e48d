use std::path::Path;

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use binmark_core::markup::ConflictPolicy;
use binmark_core::DecodeConfig;

/// Logger configuration used by binmark-dump.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggerConfig {
    /// level for the binmark crates themselves
    pub app_level_filter: LevelFilter,
    pub level_filter: LevelFilter,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            app_level_filter: LevelFilter::Info,
            level_filter: LevelFilter::Warn,
        }
    }
}

impl LoggerConfig {
    pub fn init(&self) {
        let result = env_logger::Builder::new()
            .filter_level(self.level_filter)
            .filter_module("binmark_core", self.app_level_filter)
            .filter_module("binmark_dump", self.app_level_filter)
            .parse_default_env()
            .try_init();
        if result.is_err() {
            log::debug!("logger already initialised");
        }
    }
}

/// Everything binmark-dump can be configured with.
/// Use [`AppConfigBuilder`] to build one from code.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logger: LoggerConfig,
    pub decode: DecodeConfig,
    pub conflict_policy: ConflictPolicy,
}

pub struct AppConfigBuilder {
    config: AppConfig,
}

impl Default for AppConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Default::default(),
        }
    }

    /// Start from an existing configuration, typically one read from disk.
    pub fn from_config(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn with_logger_config(mut self, logger: LoggerConfig) -> Self {
        self.config.logger = logger;
        self
    }

    pub fn with_decode_config(mut self, decode: DecodeConfig) -> Self {
        self.config.decode = decode;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.config.conflict_policy = policy;
        self
    }

    pub fn get(self) -> AppConfig {
        self.config
    }
}

pub struct AppConfigReader;

impl AppConfigReader {
    /// Read `path` if given, otherwise fall back to the defaults.
    pub fn read_or_default(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::read(path),
            None => Ok(AppConfig::default()),
        }
    }

    pub fn read(path: &Path) -> Result<AppConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<AppConfig> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binmark_core::ExcessBytes;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn partial_config_keeps_defaults() -> Result<()> {
        let config = AppConfigReader::parse(
            r#"
            conflict_policy = "reject"

            [decode]
            excess_bytes = "reject"
            "#,
        )?;
        assert_eq!(config.conflict_policy, ConflictPolicy::Reject);
        assert_eq!(config.decode.excess_bytes, ExcessBytes::Reject);
        assert!(config.decode.mark_binary_image);
        assert_eq!(config.logger.app_level_filter, LevelFilter::Info);
        Ok(())
    }

    #[test]
    fn reads_from_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "[logger]\napp_level_filter = \"debug\"\nlevel_filter = \"off\""
        )?;
        let config = AppConfigReader::read_or_default(Some(file.path()))?;
        assert_eq!(config.logger.app_level_filter, LevelFilter::Debug);
        assert_eq!(config.logger.level_filter, LevelFilter::Off);
        Ok(())
    }

    #[test]
    fn builder_overrides() {
        let config = AppConfigBuilder::new()
            .with_conflict_policy(ConflictPolicy::Reject)
            .with_decode_config(DecodeConfig {
                mark_binary_image: false,
                ..Default::default()
            })
            .get();
        assert_eq!(config.conflict_policy, ConflictPolicy::Reject);
        assert!(!config.decode.mark_binary_image);
        assert!(AppConfigReader::read_or_default(None).is_ok());
    }
}
