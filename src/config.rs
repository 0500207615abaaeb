use crate::core::db::DEFAULT_COMMAND_TIMEOUT;
use crate::core::{DalError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
///
/// Every section and key is optional; missing values take their defaults.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ui: UIConfig,
    pub logging: LoggingConfig,
}

/// Database-related configuration.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub connection_string: Option<String>,
    pub command_timeout: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            connection_string: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// UI-related configuration.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct UIConfig {
    pub show_status_tips: bool,
}

impl Default for UIConfig {
    fn default() -> Self {
        UIConfig {
            show_status_tips: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `tablescope=debug`
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// `<config dir>/tablescope/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tablescope").join("config.toml"))
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// use tablescope::config::load_config;
///
/// let config = load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref())?;
    toml::from_str(&content).map_err(|e| {
        DalError::Config(format!("{}: {}", path.as_ref().display(), e))
    })
}

/// Loads `explicit` when given (it must exist), otherwise the default file
/// if there is one, otherwise the defaults.
pub fn load_or_default(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => match default_config_path() {
            Some(path) if path.exists() => load_config(path),
            _ => Ok(Config::default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_CONFIG: &str = r#"
[database]
connection_string = "Data Source=app.db;Foreign Keys=True"
command_timeout = 5

[ui]
show_status_tips = false

[logging]
level = "tablescope=debug"
file = "/tmp/tablescope.log"
"#;

    #[test]
    fn test_load_config_from_str() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(
            config.database.connection_string.as_deref(),
            Some("Data Source=app.db;Foreign Keys=True")
        );
        assert_eq!(config.database.command_timeout, 5);
        assert!(!config.ui.show_status_tips);
        assert_eq!(config.logging.level, "tablescope=debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/tablescope.log")));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = toml::from_str("[ui]\n").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database.command_timeout, DEFAULT_COMMAND_TIMEOUT);
        assert!(config.ui.show_status_tips);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_reports_bad_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[database]\ncommand_timeout = \"soon\"").unwrap();
        match load_config(file.path()) {
            Err(DalError::Config(msg)) => assert!(msg.contains("command_timeout")),
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_path_must_exist() {
        match load_or_default(Some(Path::new("/nonexistent/tablescope.toml"))) {
            Err(DalError::Io(_)) => {}
            other => panic!("Expected I/O error, got {:?}", other),
        }
    }
}
