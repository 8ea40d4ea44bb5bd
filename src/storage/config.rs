//! JSON Configuration Management
//!
//! Handles reading and writing the engine configuration file.

use std::fs;
use std::path::PathBuf;

use crate::models::settings::EngineConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_docqa_dir};

/// Configuration service for managing engine settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: EngineConfig,
}

impl ConfigService {
    /// Create a new config service, loading existing config or creating defaults
    pub fn new() -> AppResult<Self> {
        // Ensure the config directory exists
        ensure_docqa_dir()?;

        let config_path = config_path()?;
        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = EngineConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Create a config service backed by an explicit file path
    pub fn with_path(config_path: PathBuf) -> AppResult<Self> {
        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = EngineConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &PathBuf) -> AppResult<EngineConfig> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &PathBuf, config: &EngineConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get a clone of the current configuration
    pub fn get_config_clone(&self) -> EngineConfig {
        self.config.clone()
    }

    /// Replace the configuration and persist it
    pub fn update_config(&mut self, config: EngineConfig) -> AppResult<EngineConfig> {
        config.validate().map_err(AppError::validation)?;
        self.config = config;
        self.save()?;
        Ok(self.config.clone())
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset(&mut self) -> AppResult<()> {
        self.config = EngineConfig::default();
        self.save()?;
        Ok(())
    }

    /// Check if the config service is healthy
    pub fn is_healthy(&self) -> bool {
        self.config_path.exists() && self.config.validate().is_ok()
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            config: EngineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config_file() -> (NamedTempFile, PathBuf) {
        let mut file = NamedTempFile::new().unwrap();
        let config = EngineConfig::default();
        let content = serde_json::to_string_pretty(&config).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let path = file.path().to_path_buf();
        (file, path)
    }

    #[test]
    fn test_load_config_from_file() {
        let (_file, path) = create_test_config_file();
        let config = ConfigService::load_from_file(&path).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.chunker.chunk_size, 1000);
    }

    #[test]
    fn test_save_config_to_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        let config = EngineConfig::default();

        ConfigService::save_to_file(&path, &config).unwrap();

        assert!(path.exists());
        let loaded = ConfigService::load_from_file(&path).unwrap();
        assert_eq!(loaded.chunker.chunk_size, config.chunker.chunk_size);
    }

    #[test]
    fn test_with_path_creates_default_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");

        let service = ConfigService::with_path(path.clone()).unwrap();

        assert!(path.exists());
        assert!(service.is_healthy());
        assert_eq!(service.get_config().retrieval.top_k, 5);
    }

    #[test]
    fn test_config_update() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        let mut service = ConfigService::with_path(path).unwrap();

        let mut config = service.get_config_clone();
        config.retrieval.top_k = 3;

        let updated = service.update_config(config).unwrap();
        assert_eq!(updated.retrieval.top_k, 3);

        // Persists across reload.
        service.reload().unwrap();
        assert_eq!(service.get_config().retrieval.top_k, 3);
    }

    #[test]
    fn test_update_rejects_invalid_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        let mut service = ConfigService::with_path(path).unwrap();

        let mut config = service.get_config_clone();
        config.chunker.chunk_size = 0;

        assert!(service.update_config(config).is_err());
        // The in-memory config is untouched.
        assert_eq!(service.get_config().chunker.chunk_size, 1000);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        let mut service = ConfigService::with_path(path).unwrap();

        let mut config = service.get_config_clone();
        config.retrieval.top_k = 2;
        service.update_config(config).unwrap();

        service.reset().unwrap();
        assert_eq!(service.get_config().retrieval.top_k, 5);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{\"chunker\": {\"chunk_size\": 0}}").unwrap();

        let result = ConfigService::load_from_file(&path);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
