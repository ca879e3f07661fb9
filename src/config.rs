// Configuration loading.
// Layers defaults, the user config file, and CIRCLES_* environment variables.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::{CirclesError, Result};

/// Default Firestore REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Default freshness window for cached documents: 30 seconds.
pub const DEFAULT_DOCUMENT_TTL_MS: u64 = 30_000;

/// Default freshness window for prefetched images: 5 minutes.
pub const DEFAULT_IMAGE_TTL_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Remote document store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub database: String,
    /// Web API key sent as the `key` query parameter.
    pub api_key: Option<String>,
    /// Bearer ID token for signed-in reads.
    pub id_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: String::new(),
            database: "(default)".to_string(),
            api_key: None,
            id_token: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub document_ttl_ms: u64,
    pub image_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            document_ttl_ms: DEFAULT_DOCUMENT_TTL_MS,
            image_ttl_ms: DEFAULT_IMAGE_TTL_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Get the base config directory (~/.config/circles on Linux).
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "circles").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Path to the user config file.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

impl Config {
    /// Load configuration.
    ///
    /// Precedence (lowest to highest): defaults, `config.toml` in the user
    /// config directory, `CIRCLES_*` environment variables (`__` separates
    /// sections, e.g. `CIRCLES_STORE__PROJECT_ID`).
    pub fn load() -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = config_path() {
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed("CIRCLES_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading.
    ///
    /// `store.project_id` is checked when a store client is built, so commands
    /// that never reach the store still run with it unset.
    pub fn validate(&self) -> Result<()> {
        if self.store.timeout_secs == 0 {
            return Err(CirclesError::Config(
                "store.timeout_secs must be at least 1".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(CirclesError::Config(format!(
                "invalid logging.level '{}': must be one of trace, debug, info, warn, error",
                self.logging.level
            )));
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(CirclesError::Config(format!(
                "invalid logging.format '{}': must be pretty or json",
                self.logging.format
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.document_ttl_ms, 30_000);
        assert_eq!(config.store.database, "(default)");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_defaults_validate_without_project_id() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.store.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(CirclesError::Config(_))));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[store]
project_id = "campus-circles"
api_key = "test-key"

[cache]
document_ttl_ms = 5000
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.store.project_id, "campus-circles");
        assert_eq!(config.store.api_key.as_deref(), Some("test-key"));
        assert_eq!(config.store.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.cache.document_ttl_ms, 5000);
        assert_eq!(config.cache.image_ttl_ms, DEFAULT_IMAGE_TTL_MS);
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[store]
project_id = "campus-circles"

[logging]
format = "xml"
"#,
        )
        .unwrap();

        assert!(Config::load_from_file(&path).is_err());
    }
}
