//! Configuration file support for retouch.
//!
//! Settings are stored as versioned JSON. Every field has a serde default so
//! older or partial files keep loading.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::history::HistoryConfig;
use crate::selection::SelectionConfig;
use crate::session::SessionConfig;
use crate::view::ViewConfig;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Application name (for identification)
    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default)]
    pub preferences: UserPreferences,

    /// Zoom limits and step
    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    /// Undo/redo depth
    #[serde(default)]
    pub history: HistoryConfig,

    /// Where operations run
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_app_name() -> String {
    "retouch".to_string()
}

/// User preferences section of the config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

impl EditorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            app_name: default_app_name(),
            preferences: UserPreferences::default(),
            view: ViewConfig::default(),
            selection: SelectionConfig::default(),
            history: HistoryConfig::default(),
            session: SessionConfig::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the editor cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.view.validate().map_err(ConfigError::Invalid)?;
        if self.history.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "history.max_depth must be at least 1".to_string(),
            ));
        }
        if self.selection.min_size == 0 {
            return Err(ConfigError::Invalid(
                "selection.min_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "retouch-config.json"
    }

    /// Read configuration from an explicit path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path for auto-load/save.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Option<std::path::PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("retouch").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("retouch")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Write configuration to an explicit path, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Save configuration to the default path.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save(&path)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A value outside its usable range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::AspectPreset;
    use crate::session::DispatchMode;

    #[test]
    fn test_default_config() {
        let config = EditorConfig::new();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.app_name, "retouch");
        assert_eq!(config.preferences.log_level, LogLevel::Info);
        assert_eq!(config.history.max_depth, crate::constants::MAX_HISTORY);
        assert_eq!(config.session.dispatch, DispatchMode::Background);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut config = EditorConfig::new();
        config.preferences.log_level = LogLevel::Debug;
        config.selection.default_aspect = AspectPreset::Widescreen;
        config.session.dispatch = DispatchMode::Inline;
        config.view.max_zoom = 4.0;

        let json = config.to_json().unwrap();
        assert!(json.contains("\"16:9\""));
        let loaded = EditorConfig::from_json(&json).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let loaded = EditorConfig::from_json(r#"{ "version": 1 }"#).unwrap();
        assert_eq!(loaded, EditorConfig::new());

        let loaded =
            EditorConfig::from_json(r#"{ "version": 1, "view": { "max_zoom": 5.0 } }"#).unwrap();
        assert_eq!(loaded.view.max_zoom, 5.0);
        assert_eq!(loaded.view.min_zoom, crate::constants::MIN_ZOOM);
    }

    #[test]
    fn test_version_too_new() {
        let json = format!(r#"{{ "version": {} }}"#, CONFIG_VERSION + 1);
        let result = EditorConfig::from_json(&json);
        assert!(matches!(result, Err(ConfigError::VersionTooNew { .. })));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = EditorConfig::from_json(r#"{ "version": 1, "history": { "max_depth": 0 } }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = EditorConfig::from_json(
            r#"{ "version": 1, "view": { "min_zoom": 3.0, "max_zoom": 2.0 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            EditorConfig::from_json("not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("retouch-config-test-{}", std::process::id()));
        let path = dir.join("nested").join(EditorConfig::default_filename());

        let mut config = EditorConfig::new();
        config.history.max_depth = 4;
        config.session.dispatch = DispatchMode::Inline;
        config.save(&path).unwrap();

        let loaded = EditorConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
        assert_eq!(LogLevel::Trace.to_level_filter(), log::LevelFilter::Trace);
    }
}
