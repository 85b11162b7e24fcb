//! Configuration File Loading
//!
//! Finds, loads and saves [`ParserSettings`] as TOML or JSON files.

use super::ParserSettings;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file
pub const CONFIG_ENV_VAR: &str = "SHELL_PARSER_CONFIG";

/// Base file name searched for in each search path
const CONFIG_FILE_STEM: &str = "shell-parser";

/// Configuration file loader
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths for configuration files
    search_paths: Vec<PathBuf>,
    /// Supported configuration file formats
    supported_formats: Vec<ConfigFormat>,
    /// Current configuration file path (if loaded)
    current_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    fn extension(self) -> &'static str {
        match self {
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }

    fn name(self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Json => "JSON",
        }
    }

    /// Pick a format from a file extension, defaulting to TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

impl ConfigLoader {
    /// Create a loader over the default search paths
    pub fn new() -> Self {
        Self::with_search_paths(Self::get_search_paths())
    }

    /// Create a loader over explicit search directories
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            supported_formats: vec![ConfigFormat::Toml, ConfigFormat::Json],
            current_path: None,
        }
    }

    /// Load settings from the first file found, falling back to defaults
    pub fn load() -> Result<ParserSettings> {
        let mut loader = Self::new();
        loader.load_or_default()
    }

    /// Load settings from the search paths, falling back to defaults
    pub fn load_or_default(&mut self) -> Result<ParserSettings> {
        if let Ok(explicit) = env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(explicit);
            let settings = Self::load_from_path(&path)?;
            self.current_path = Some(path);
            return Ok(settings);
        }

        match self.find_and_load_config()? {
            Some((path, settings)) => {
                info!("Loaded parser settings from {}", path.display());
                self.current_path = Some(path);
                Ok(settings)
            }
            None => {
                debug!("No parser settings file found, using defaults");
                Ok(ParserSettings::default())
            }
        }
    }

    /// Load and validate settings from a specific file
    pub fn load_from_path(path: &Path) -> Result<ParserSettings> {
        if !path.exists() {
            return Err(Error::ConfigNotFound);
        }

        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let format = ConfigFormat::from_path(path);
        let settings: ParserSettings = match format {
            ConfigFormat::Toml => toml::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                format: format.name().to_string(),
                reason: e.to_string(),
            })?,
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|e| Error::ConfigParseFailed {
                    format: format.name().to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a specific path, format chosen by extension
    pub fn save_to_path(settings: &ParserSettings, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::ConfigSaveFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let format = ConfigFormat::from_path(path);
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(settings).map_err(|e| {
                Error::ConfigSerializationFailed {
                    format: format.name().to_string(),
                    reason: e.to_string(),
                }
            })?,
            ConfigFormat::Toml => {
                toml::to_string_pretty(settings).map_err(|e| Error::ConfigSerializationFailed {
                    format: format.name().to_string(),
                    reason: e.to_string(),
                })?
            }
        };

        fs::write(path, content).map_err(|e| Error::ConfigSaveFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Path of the file the settings were loaded from, if any
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Find and load configuration from search paths
    fn find_and_load_config(&self) -> Result<Option<(PathBuf, ParserSettings)>> {
        for dir in &self.search_paths {
            for format in &self.supported_formats {
                let config_path = dir.join(CONFIG_FILE_STEM).with_extension(format.extension());

                if config_path.exists() {
                    match Self::load_from_path(&config_path) {
                        Ok(settings) => return Ok(Some((config_path, settings))),
                        Err(e) => {
                            warn!(
                                "Failed to load parser settings from {}: {}",
                                config_path.display(),
                                e
                            );
                            continue;
                        }
                    }
                }
            }
        }

        Ok(None)
    }

    /// Get default search paths for configuration files
    fn get_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd);
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(CONFIG_FILE_STEM));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join(CONFIG_FILE_STEM));
        }

        paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
