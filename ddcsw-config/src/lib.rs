use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use ddcsw_common::{
    duration::deserialize_duration, error::ConfigError, AppletSettings, CommandBuilder,
    DdcswError, DisplayPreferences, MonitorCache, ProcessExecutor, Result,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    /// Per-monitor settings keyed by the model name ddcutil reports.
    #[serde(default)]
    pub display: HashMap<String, DisplayConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    #[serde(default = "default_tool")]
    pub tool: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(
        default = "default_command_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "humantime_serde::serialize"
    )]
    pub command_timeout: Duration,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    #[serde(
        default = "default_cache_max_age",
        deserialize_with = "deserialize_duration",
        serialize_with = "humantime_serde::serialize"
    )]
    pub cache_max_age: Duration,
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DisplayConfig {
    pub label: Option<String>,
    #[serde(default)]
    pub hidden_inputs: Vec<u16>,
}

// Default values
fn default_tool() -> String {
    "ddcutil".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_use_cache() -> bool {
    true
}

fn default_cache_max_age() -> Duration {
    Duration::from_secs(90 * 24 * 3600) // 90 days
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            extra_args: Vec::new(),
            command_timeout: default_command_timeout(),
            use_cache: default_use_cache(),
            cache_max_age: default_cache_max_age(),
            cache_file: None,
        }
    }
}

impl Config {
    /// Loads the user config; a missing file means defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            log::info!("No config file at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DdcswError::Config(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }))?;

        let config: Config = toml::from_str(&content)?;

        config.validate()?;

        log::info!("Configuration loaded from {:?}", path);
        log::debug!("{:?}", config);
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(DdcswError::Config(ConfigError::NoConfigDir))?
            .join("ddcsw");

        Ok(config_dir.join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.global.validate()?;

        for (name, display) in &self.display {
            if let Some(code) = display.hidden_inputs.iter().find(|code| **code > 0xff) {
                return Err(DdcswError::Config(ConfigError::Validation {
                    message: format!("Display '{}': hidden input {} is not a valid input code", name, code),
                }));
            }
            if display.label.as_deref().is_some_and(|l| l.trim().is_empty()) {
                return Err(DdcswError::Config(ConfigError::Validation {
                    message: format!("Display '{}': label cannot be empty", name),
                }));
            }
        }

        Ok(())
    }

    pub fn command_builder(&self) -> CommandBuilder {
        CommandBuilder::new(self.tool_path()).with_extra_args(self.global.extra_args.clone())
    }

    pub fn executor(&self) -> ProcessExecutor {
        ProcessExecutor::new(self.tool_path(), Some(self.global.command_timeout))
    }

    pub fn applet_settings(&self) -> AppletSettings {
        AppletSettings {
            use_cache: self.global.use_cache,
            cache_file: self
                .global
                .cache_file
                .clone()
                .unwrap_or_else(MonitorCache::get_cache_file),
            cache_max_age: self.global.cache_max_age,
            preferences: self
                .display
                .iter()
                .map(|(name, display)| {
                    (
                        name.clone(),
                        DisplayPreferences {
                            label: display.label.clone(),
                            hidden_inputs: display.hidden_inputs.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    fn tool_path(&self) -> PathBuf {
        let tool = Path::new(&self.global.tool);
        if tool.components().count() > 1 {
            tool.to_path_buf()
        } else {
            ProcessExecutor::resolve_tool(&self.global.tool)
        }
    }
}

impl GlobalConfig {
    fn validate(&self) -> Result<()> {
        if self.tool.trim().is_empty() {
            return Err(DdcswError::Config(ConfigError::InvalidValue {
                field: "tool".to_string(),
                value: self.tool.clone(),
            }));
        }

        if self.command_timeout < Duration::from_secs(1) {
            return Err(DdcswError::Config(ConfigError::InvalidValue {
                field: "command_timeout".to_string(),
                value: format!("{:?}", self.command_timeout),
            }));
        }

        if self.cache_max_age < Duration::from_secs(60) {
            return Err(DdcswError::Config(ConfigError::InvalidValue {
                field: "cache_max_age".to_string(),
                value: format!("{:?}", self.cache_max_age),
            }));
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.global.tool, "ddcutil");
        assert!(config.global.extra_args.is_empty());
        assert_eq!(config.global.command_timeout, Duration::from_secs(30));
        assert!(config.global.use_cache);
        assert!(config.display.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duration_deserialization() {
        let toml_str = r#"
            [global]
            command_timeout = "1m"
            cache_max_age = "7days"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.global.command_timeout, Duration::from_secs(60));
        assert_eq!(config.global.cache_max_age, Duration::from_secs(7 * 86400));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.global.command_timeout = Duration::from_millis(10);
        assert!(config.validate().is_err());

        config.global.command_timeout = Duration::from_secs(30);
        config.global.tool = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_content = r#"
            [global]
            tool = "/usr/local/bin/ddcutil"
            extra_args = ["--sleep-multiplier", "2"]
            command_timeout = "45s"
            use_cache = false

            [display."DELL U2415"]
            label = "Desk"
            hidden_inputs = [0x11]
        "#;

        fs::write(&config_path, config_content).unwrap();

        let config = Config::load_from_path(&config_path).unwrap();
        assert_eq!(config.global.tool, "/usr/local/bin/ddcutil");
        assert_eq!(config.global.command_timeout, Duration::from_secs(45));
        assert!(!config.global.use_cache);

        let builder = config.command_builder();
        assert_eq!(
            builder.command_line(&builder.set_input(2, 0x0f)),
            "/usr/local/bin/ddcutil --sleep-multiplier 2 -d 2 setvcp 60 0x0f"
        );

        let settings = config.applet_settings();
        assert!(!settings.use_cache);
        let prefs = settings.preferences.get("DELL U2415").unwrap();
        assert_eq!(prefs.label.as_deref(), Some("Desk"));
        assert_eq!(prefs.hidden_inputs, vec![0x11]);
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        match Config::load_from_path(&config_path) {
            Err(DdcswError::Config(ConfigError::FileRead { .. })) => {},
            other => panic!("Expected ConfigError::FileRead, got {:?}", other),
        }
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");

        let invalid_content = r#"
            [global]
            command_timeout = "whenever"
        "#;

        fs::write(&config_path, invalid_content).unwrap();

        match Config::load_from_path(&config_path) {
            Err(DdcswError::Config(ConfigError::TomlParse { .. })) => {},
            other => panic!("Expected ConfigError::TomlParse, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_cache_file() {
        let config: Config = toml::from_str(r#"
            [global]
            cache_file = "/var/tmp/ddcsw.json"
        "#).unwrap();
        assert_eq!(config.applet_settings().cache_file, PathBuf::from("/var/tmp/ddcsw.json"));
    }

    #[test]
    fn test_serializes_durations_readably() {
        let serialized = toml::to_string(&Config::default()).unwrap();
        assert!(serialized.contains("command_timeout = \"30s\""));
    }
}
