//! Console configuration.

use novel_admin_core::types::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Console-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Least privileged role allowed into the console. `user` is treated
    /// as `editor`; members never get in.
    pub required_role: Role,
    /// Rows per page in list views.
    pub page_size: usize,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Object storage bucket for uploaded images.
    pub image_bucket: String,
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    /// Base of public object URLs.
    pub public_base_url: String,
    /// Capacity of the change feed per listener.
    pub change_buffer: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            required_role: Role::Editor,
            page_size: 20,
            log_level: "info".to_string(),
            image_bucket: "images".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            public_base_url: "memory://storage".to_string(),
            change_buffer: 256,
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// JSON snapshot used by the memory backend.
    pub snapshot_path: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("novel-admin.json"),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub console: ConsoleConfig,
    pub backend: BackendConfig,
}

impl AdminConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.console.page_size = page_size;
        self
    }

    /// Sets the least privileged role allowed into the console.
    pub fn required_role(mut self, role: Role) -> Self {
        self.console.required_role = role;
        self
    }

    /// Sets the image bucket.
    pub fn image_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.console.image_bucket = bucket.into();
        self
    }

    /// Sets the upload size limit.
    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.console.max_upload_bytes = bytes;
        self
    }

    /// Sets the snapshot path.
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backend.snapshot_path = path.into();
        self
    }

    /// Checks values that have no sensible fallback.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.console.page_size == 0 {
            return Err(ConfigError::Invalid("console.page_size must be positive".into()));
        }
        if self.console.image_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("console.image_bucket must not be empty".into()));
        }
        Ok(())
    }
}

/// Parses configuration from TOML text. Missing keys take their defaults.
pub fn parse_config(content: &str) -> Result<AdminConfig, ConfigError> {
    let config: AdminConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AdminConfig, ConfigError> {
    let content =
        std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::IoError(e.to_string()))?;
    parse_config(&content)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdminConfig::default();
        assert_eq!(config.console.page_size, 20);
        assert_eq!(config.backend.snapshot_path, PathBuf::from("novel-admin.json"));
    }

    #[test]
    fn test_partial_toml() {
        let config = parse_config(
            r#"
            [console]
            page_size = 50
            image_bucket = "covers"
            required_role = "admin"
            "#,
        )
        .unwrap();
        assert_eq!(config.console.page_size, 50);
        assert_eq!(config.console.image_bucket, "covers");
        assert_eq!(config.console.log_level, "info");
        assert_eq!(config.console.required_role, Role::Admin);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let result = parse_config("[console]\npage_size = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.toml");
        std::fs::write(&path, "[backend]\nsnapshot_path = \"data/state.json\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.backend.snapshot_path, PathBuf::from("data/state.json"));
    }
}
