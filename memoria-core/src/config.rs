//! Configuration types for the Memoria client

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MemoriaError, Result};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "memoria.yaml";

/// Main configuration for the Memoria client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoriaConfig {
    /// Token (word) budget for everything sent with one prompt
    pub max_total_tokens: usize,

    /// Prompt builder variant (see [`crate::prompt::PromptBuilderFactory`])
    pub model: String,

    /// Memory policy variant: "buffer" or "summary"
    pub memory: String,

    /// Overrides the prompt variant's built-in system instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Model service connection
    pub llm: LLMProviderConfig,

    /// Saved session storage
    pub storage: StorageConfig,

    /// Waiting indicator
    pub indicator: IndicatorConfig,
}

impl Default for MemoriaConfig {
    fn default() -> Self {
        Self {
            max_total_tokens: 1024,
            model: "llama2".to_string(),
            memory: "buffer".to_string(),
            system_prompt: None,
            llm: LLMProviderConfig::default(),
            storage: StorageConfig::default(),
            indicator: IndicatorConfig::default(),
        }
    }
}

/// Model service connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMProviderConfig {
    /// Base URL of the Ollama API
    pub base_url: String,

    /// Model name sent to the service (defaults to `model`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    /// Sampling temperature (service default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Timeout for synchronous (summarization) requests
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for LLMProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model_name: None,
            temperature: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Saved session storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one file per saved session
    pub sessions_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            sessions_dir: base.join("memoria").join("sessions"),
        }
    }
}

/// Waiting indicator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Time between frames
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Glyphs cycled through, one per frame
    pub frames: String,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            frames: r"|/-\".to_string(),
        }
    }
}

impl MemoriaConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (`memoria.yaml`, or `path`, or the path from
    ///    `MEMORIA_CONFIG_PATH`)
    /// 3. `MEMORIA_`-prefixed environment overrides (`MEMORIA_MAX_TOTAL_TOKENS`,
    ///    `MEMORIA_LLM__BASE_URL`, ...)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Yaml},
        };

        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("MEMORIA_CONFIG_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

        let config: MemoriaConfig = Figment::from(Serialized::defaults(MemoriaConfig::default()))
            .merge(Yaml::file(&file))
            .merge(Env::prefixed("MEMORIA_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| {
                MemoriaError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Yaml},
        };

        let config: MemoriaConfig = Figment::from(Serialized::defaults(MemoriaConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                MemoriaError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_total_tokens == 0 {
            return Err(MemoriaError::Configuration(
                "max_total_tokens must be greater than zero".to_string(),
            ));
        }
        if self.indicator.frames.is_empty() {
            return Err(MemoriaError::Configuration(
                "indicator.frames must contain at least one glyph".to_string(),
            ));
        }
        Ok(())
    }

    /// Name of the model as sent to the service
    pub fn service_model_name(&self) -> &str {
        self.llm.model_name.as_deref().unwrap_or(&self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = MemoriaConfig::default();
        assert_eq!(config.max_total_tokens, 1024);
        assert_eq!(config.model, "llama2");
        assert_eq!(config.memory, "buffer");
        assert_eq!(config.indicator.interval, Duration::from_millis(100));
        assert!(config.storage.sessions_dir.ends_with("memoria/sessions"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("memoria.yaml");

        let mut config = MemoriaConfig::default();
        config.max_total_tokens = 300;
        config.memory = "summary".to_string();
        config.llm.model_name = Some("zephyr:7b".to_string());
        config.indicator.interval = Duration::from_millis(250);
        config.save(&path).unwrap();

        let loaded = MemoriaConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.service_model_name(), "zephyr:7b");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memoria.yaml");
        std::fs::write(&path, "max_total_tokens: 300\nllm:\n  request_timeout: 5s\n").unwrap();

        let loaded = MemoriaConfig::from_file(&path).unwrap();
        assert_eq!(loaded.max_total_tokens, 300);
        assert_eq!(loaded.model, "llama2");
        assert_eq!(loaded.llm.request_timeout, Duration::from_secs(5));
        assert_eq!(loaded.llm.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_validation() {
        let mut config = MemoriaConfig::default();
        config.max_total_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = MemoriaConfig::default();
        config.indicator.frames.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memoria.yaml");
        std::fs::write(&path, "max_total_tokens: [not, a, number]\n").unwrap();

        assert!(matches!(
            MemoriaConfig::from_file(&path),
            Err(MemoriaError::Configuration(_))
        ));
    }
}
