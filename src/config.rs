//! Editor configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "gguf-edit.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Display-time settings; the codec never reads these
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Maximum number of array elements shown before eliding the rest
    #[serde(default = "default_max_array_elements")]
    pub max_array_elements: usize,
}

fn default_max_array_elements() -> usize {
    25
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_array_elements: default_max_array_elements(),
        }
    }
}

impl EditorConfig {
    pub fn with_max_array_elements(mut self, max: usize) -> Self {
        self.max_array_elements = max;
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Apply `GGUF_EDIT_*` environment overrides
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(max) = std::env::var("GGUF_EDIT_MAX_ARRAY_ELEMENTS") {
            self.max_array_elements = max.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("GGUF_EDIT_MAX_ARRAY_ELEMENTS={max:?} is not a count"))
            })?;
        }
        Ok(self)
    }

    /// Explicit file, else `gguf-edit.toml` if present, else defaults; then env
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(EditorConfig::default().max_array_elements, 25);
        assert_eq!(EditorConfig::from_toml_str("").unwrap(), EditorConfig::default());
    }

    #[test]
    fn test_parse_toml() {
        let config = EditorConfig::from_toml_str("max_array_elements = 8\n").unwrap();
        assert_eq!(config.max_array_elements, 8);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            EditorConfig::from_toml_str("max_array_elements = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EditorConfig::default().with_max_array_elements(3);
        let text = config.to_toml_string().unwrap();
        assert_eq!(EditorConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "max_array_elements = 4").unwrap();
        let config = EditorConfig::from_file(&path).unwrap();
        assert_eq!(config.max_array_elements, 4);
    }
}
