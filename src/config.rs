use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::preferences::HistoryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BarkeepConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub preferences: PreferencesConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

/// File locations. Relative paths resolve against `data_dir`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub catalog_path: String,
    pub catalog_index_path: String,
    pub preferences_index_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub build_batch_size: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PreferencesConfig {
    pub history_policy: HistoryPolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Never read from the config file; populated from `OPENAI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_barkeep_dir().to_string_lossy().into_owned(),
            catalog_path: "data/cocktails.csv".into(),
            catalog_index_path: "models/cocktails_index.bin".into(),
            preferences_index_path: "models/preferences_index.bin".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_barkeep_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            build_batch_size: 32,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            temperature: 0.7,
            timeout_secs: 60,
            api_key: None,
        }
    }
}

/// Returns `~/.barkeep/`, falling back to `./.barkeep` without a home directory.
pub fn default_barkeep_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".barkeep")
}

/// Returns the default config file path: `~/.barkeep/config.toml`
pub fn default_config_path() -> PathBuf {
    default_barkeep_dir().join("config.toml")
}

impl BarkeepConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            BarkeepConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (BARKEEP_DATA_DIR, BARKEEP_CATALOG, BARKEEP_LOG_LEVEL, BARKEEP_PORT, OPENAI_API_KEY).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("BARKEEP_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("BARKEEP_CATALOG") {
            self.storage.catalog_path = val;
        }
        if let Ok(val) = std::env::var("BARKEEP_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("BARKEEP_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid BARKEEP_PORT"),
            }
        }
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            if !val.trim().is_empty() {
                self.llm.api_key = Some(val);
            }
        }
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }

    pub fn resolved_catalog_path(&self) -> PathBuf {
        self.resolve(&self.storage.catalog_path)
    }

    pub fn resolved_catalog_index_path(&self) -> PathBuf {
        self.resolve(&self.storage.catalog_index_path)
    }

    pub fn resolved_preferences_index_path(&self) -> PathBuf {
        self.resolve(&self.storage.preferences_index_path)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let expanded = expand_tilde(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.resolved_data_dir().join(expanded)
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BarkeepConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.retrieval.default_top_k, 5);
        assert_eq!(config.preferences.history_policy, HistoryPolicy::Replace);
        assert_eq!(config.llm.model, "gpt-4o");
        assert!(config.storage.catalog_path.ends_with("cocktails.csv"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
port = 9000

[storage]
data_dir = "/srv/barkeep"
catalog_path = "/data/drinks.csv"

[preferences]
history_policy = "append"
"#;
        let config: BarkeepConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.preferences.history_policy, HistoryPolicy::Append);
        // defaults still apply for unset fields
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.retrieval.build_batch_size, 32);

        assert_eq!(
            config.resolved_catalog_path(),
            PathBuf::from("/data/drinks.csv")
        );
        assert_eq!(
            config.resolved_catalog_index_path(),
            PathBuf::from("/srv/barkeep/models/cocktails_index.bin")
        );
    }

    #[test]
    fn api_key_is_not_read_from_file() {
        let toml_str = r#"
[llm]
api_key = "sk-from-file"
model = "gpt-4o-mini"
"#;
        let config: BarkeepConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = BarkeepConfig::default();
        std::env::set_var("BARKEEP_CATALOG", "/tmp/override.csv");
        std::env::set_var("BARKEEP_LOG_LEVEL", "trace");
        std::env::set_var("BARKEEP_PORT", "8123");

        config.apply_env_overrides();

        assert_eq!(config.storage.catalog_path, "/tmp/override.csv");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.server.port, 8123);

        // Clean up
        std::env::remove_var("BARKEEP_CATALOG");
        std::env::remove_var("BARKEEP_LOG_LEVEL");
        std::env::remove_var("BARKEEP_PORT");
    }
}
