//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `TURNTABLE_{PROVIDER}_API_KEY`, or the bare
//!    `BRIA_API_KEY` / `TRIPO_API_KEY`
//! 2. Project-local: `.turntable/config.toml`
//! 3. Global: `~/.turntable/config.toml`
//!
//! API keys are secrets: they are read once at start-up and never printed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use turntable_core::{Result, TurntableError};

use crate::storage::DEFAULT_STORAGE_ROOT;

/// Provider-specific configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("enabled", &self.enabled)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

/// Which providers back each pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_image_provider")]
    pub image_provider: String,
    #[serde(default = "default_model_provider")]
    pub model_provider: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            image_provider: default_image_provider(),
            model_provider: default_model_provider(),
        }
    }
}

fn default_image_provider() -> String {
    "bria".to_string()
}
fn default_model_provider() -> String {
    "tripo".to_string()
}

/// Worker pool and storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_storage_root")]
    pub storage_root: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            storage_root: default_storage_root(),
        }
    }
}

fn default_workers() -> usize {
    2
}
fn default_storage_root() -> String {
    DEFAULT_STORAGE_ROOT.to_string()
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurntableConfigFile {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl TurntableConfigFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Starter file listing the real providers without credentials
    pub fn starter() -> Self {
        let mut file = Self::default();
        for name in ["bria", "tripo"] {
            file.providers.insert(
                name.to_string(),
                ProviderConfig {
                    enabled: true,
                    ..Default::default()
                },
            );
        }
        file
    }
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct TurntableConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub generation: GenerationConfig,
    pub pipeline: PipelineConfig,
}

impl TurntableConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = TurntableConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        let local_path = PathBuf::from(".turntable/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        Self::apply_env_overrides(&mut config);
        Ok(Self::from_file(config))
    }

    /// Load config from a specific file path only (plus env overrides)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(Self::from_file(config))
    }

    fn from_file(file: TurntableConfigFile) -> Self {
        Self {
            providers: file.providers,
            generation: file.generation,
            pipeline: file.pipeline,
        }
    }

    /// Get API key for a provider
    pub fn api_key(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Get API URL override for a provider
    pub fn api_url(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_url.as_deref())
    }

    /// Check if a provider is enabled
    pub fn is_enabled(&self, provider_name: &str) -> bool {
        self.providers
            .get(provider_name)
            .map(|p| p.enabled)
            .unwrap_or(true)
    }

    /// Route both stages to the offline mock providers
    pub fn use_mock_providers(&mut self) {
        self.generation.image_provider = "mock".to_string();
        self.generation.model_provider = "mock".to_string();
    }

    /// Write a starter `.turntable/config.toml` under `dir`.
    ///
    /// An existing file is left untouched. Returns the config path.
    pub fn init_project(dir: &Path) -> Result<PathBuf> {
        let config_dir = dir.join(".turntable");
        let path = config_dir.join("config.toml");
        if path.exists() {
            return Err(TurntableError::ConfigError(format!(
                "{} already exists",
                path.display()
            )));
        }
        std::fs::create_dir_all(&config_dir)?;
        std::fs::write(&path, TurntableConfigFile::starter().to_toml()?)?;
        Ok(path)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".turntable").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<TurntableConfigFile> {
        let content = std::fs::read_to_string(path)?;
        TurntableConfigFile::parse(&content).map_err(|e| {
            TurntableError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn merge_into(base: &mut TurntableConfigFile, overlay: TurntableConfigFile) {
        for (name, provider) in overlay.providers {
            let entry = base.providers.entry(name).or_default();
            if provider.api_key.is_some() {
                entry.api_key = provider.api_key;
            }
            if provider.api_url.is_some() {
                entry.api_url = provider.api_url;
            }
            entry.enabled = provider.enabled;
        }

        if overlay.generation.image_provider != default_image_provider() {
            base.generation.image_provider = overlay.generation.image_provider;
        }
        if overlay.generation.model_provider != default_model_provider() {
            base.generation.model_provider = overlay.generation.model_provider;
        }
        if overlay.pipeline.workers != default_workers() {
            base.pipeline.workers = overlay.pipeline.workers;
        }
        if overlay.pipeline.storage_root != default_storage_root() {
            base.pipeline.storage_root = overlay.pipeline.storage_root;
        }
    }

    fn apply_env_overrides(config: &mut TurntableConfigFile) {
        let provider_names = ["bria", "tripo"];
        for name in &provider_names {
            let upper = name.to_uppercase();
            let prefixed = format!("TURNTABLE_{}_API_KEY", upper);
            let bare = format!("{}_API_KEY", upper);
            let key = std::env::var(&prefixed).or_else(|_| std::env::var(&bare));
            if let Ok(key) = key {
                let entry = config.providers.entry(name.to_string()).or_default();
                entry.api_key = Some(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("turntable_config_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_config_from_file() {
        let config_str = r#"
[providers.bria]
api_url = "https://bria.example.com/v2/image/generate"
enabled = true

[providers.tripo]
enabled = false

[generation]
model_provider = "mock"

[pipeline]
workers = 4
storage_root = "/tmp/renders"
"#;
        let path = temp_config(config_str);
        let config = TurntableConfig::load_from_file(&path).unwrap();

        assert!(config.is_enabled("bria"));
        assert!(!config.is_enabled("tripo"));
        assert_eq!(config.generation.image_provider, "bria");
        assert_eq!(config.generation.model_provider, "mock");
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.pipeline.storage_root, "/tmp/renders");
        assert_eq!(
            config.api_url("bria"),
            Some("https://bria.example.com/v2/image/generate")
        );

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_env_var_override() {
        let path = temp_config("[providers.tripo]\napi_key = \"file-key\"\n");

        std::env::set_var("TURNTABLE_TRIPO_API_KEY", "env-key-override");
        let config = TurntableConfig::load_from_file(&path).unwrap();
        assert_eq!(config.api_key("tripo"), Some("env-key-override"));
        std::env::remove_var("TURNTABLE_TRIPO_API_KEY");

        std::fs::remove_file(&path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_defaults() {
        let config = TurntableConfig::default();
        assert_eq!(config.generation.image_provider, "bria");
        assert_eq!(config.generation.model_provider, "tripo");
        assert_eq!(config.pipeline.workers, 2);
        assert_eq!(config.pipeline.storage_root, "assets_storage");
        assert!(config.is_enabled("nonexistent"));
    }

    #[test]
    fn test_merge_project_over_global() {
        let mut base = TurntableConfigFile::default();
        base.providers.insert(
            "bria".to_string(),
            ProviderConfig {
                api_key: Some("global".to_string()),
                api_url: Some("https://global".to_string()),
                enabled: true,
            },
        );
        let mut overlay = TurntableConfigFile::default();
        overlay.providers.insert(
            "bria".to_string(),
            ProviderConfig {
                api_key: Some("project".to_string()),
                api_url: None,
                enabled: true,
            },
        );
        overlay.pipeline.workers = 8;

        TurntableConfig::merge_into(&mut base, overlay);
        let bria = &base.providers["bria"];
        assert_eq!(bria.api_key.as_deref(), Some("project"));
        assert_eq!(bria.api_url.as_deref(), Some("https://global"));
        assert_eq!(base.pipeline.workers, 8);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let provider = ProviderConfig {
            api_key: Some("sk-very-secret".to_string()),
            api_url: None,
            enabled: true,
        };
        let printed = format!("{:?}", provider);
        assert!(!printed.contains("sk-very-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_init_project_writes_loadable_starter() {
        let dir = std::env::temp_dir().join(format!("turntable_init_test_{}", uuid::Uuid::new_v4()));
        let path = TurntableConfig::init_project(&dir).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[providers.bria]"));
        assert!(!written.contains("api_key"));

        let loaded = TurntableConfigFile::parse(&written).unwrap();
        assert!(loaded.providers["tripo"].enabled);
        assert_eq!(loaded.pipeline.workers, 2);

        assert!(TurntableConfig::init_project(&dir).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_parse_error_is_toml_error() {
        let err = TurntableConfigFile::parse("[pipeline\nworkers = ").unwrap_err();
        assert_eq!(err.kind(), "toml");
    }

    #[test]
    fn test_empty_key_counts_as_missing() {
        let mut config = TurntableConfig::default();
        config.providers.insert(
            "bria".to_string(),
            ProviderConfig {
                api_key: Some(String::new()),
                ..Default::default()
            },
        );
        assert_eq!(config.api_key("bria"), None);
    }
}
