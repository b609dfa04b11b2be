use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value {value:?} for {field} in {config_path}")]
    InvalidValue {
        config_path: PathBuf,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File opened when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_file: Option<PathBuf>,
    pub editor: EditorConfig,
}

/// The `[editor]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Continue and split list items on Enter
    pub continue_lists: bool,
    /// Blocks starting with this prefix are shown as bookmarks
    pub bookmark_prefix: String,
    /// One of off, error, warn, info, debug, trace
    pub log_level: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            continue_lists: true,
            bookmark_prefix: "// ".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        if !LOG_LEVELS.contains(&config.editor.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                config_path: config_path.to_path_buf(),
                field: "editor.log_level",
                value: config.editor.log_level,
            });
        }

        // Expand shell variables and tilde in the default file path
        config.default_file = config
            .default_file
            .map(|path| Self::expand_path(&path).unwrap_or(path));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/blockmark");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, content).unwrap();
        (temp_dir, config_file)
    }

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/blockmark/config.toml"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_file, None);
        assert!(config.editor.continue_lists);
        assert_eq!(config.editor.bookmark_prefix, "// ");
        assert_eq!(config.editor.log_level, "warn");
    }

    #[test]
    fn test_partial_editor_table_keeps_other_defaults() {
        let (_dir, config_file) = write_config("[editor]\ncontinue_lists = false\n");

        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert!(!config.editor.continue_lists);
        assert_eq!(config.editor.bookmark_prefix, "// ");
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test/path");
        let expanded = Config::expand_path(&path).unwrap();

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_with_absolute_path() {
        let path = PathBuf::from("/absolute/path");
        assert_eq!(Config::expand_path(&path).unwrap(), path);
    }

    #[test]
    fn test_default_file_env_var_is_expanded_on_load() {
        unsafe {
            env::set_var("BLOCKMARK_TEST_NOTES", "/custom/notes");
        }

        let (_dir, config_file) =
            write_config("default_file = \"$BLOCKMARK_TEST_NOTES/today.md\"\n");
        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(
            config.default_file,
            Some(PathBuf::from("/custom/notes/today.md"))
        );

        unsafe {
            env::remove_var("BLOCKMARK_TEST_NOTES");
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let (_dir, config_file) = write_config("[editor\n");
        let result = Config::load_from_path(&config_file);
        assert!(matches!(result, Err(ConfigError::ConfigParseError { .. })));
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let (_dir, config_file) = write_config("[editor]\nlog_level = \"loud\"\n");

        let result = Config::load_from_path(&config_file);

        match result {
            Err(ConfigError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, "editor.log_level");
                assert_eq!(value, "loud");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let test_config = Config {
            default_file: Some(PathBuf::from("/tmp/notes.md")),
            editor: EditorConfig {
                continue_lists: false,
                bookmark_prefix: "%% ".to_string(),
                log_level: "debug".to_string(),
            },
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
    }
}
