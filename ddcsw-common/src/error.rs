use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ddcsw operations
#[derive(Error, Debug)]
pub enum DdcswError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ddcutil error: {0}")]
    Tool(#[from] ToolError),

    #[error("Monitor cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path:?}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse TOML configuration: {message}")]
    TomlParse { message: String },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Failures of a ddcutil invocation
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} not found")]
    NotFound { tool: String },

    #[error("Failed to execute {command}")]
    Spawn { command: String, source: std::io::Error },

    #[error("{command} returned non-zero exit code: {code}")]
    NonZeroExit { command: String, code: i32, stderr: String },

    #[error("{command} timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("{command} was killed by a signal")]
    Killed { command: String },
}

/// Monitor cache persistence errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read cache file: {path:?}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to write cache file: {path:?}")]
    FileWrite { path: PathBuf, source: std::io::Error },

    #[error("Failed to create cache directory: {path:?}")]
    DirectoryCreation { path: PathBuf, source: std::io::Error },

    #[error("Failed to serialize monitor cache")]
    Serialization,

    #[error("Cache file is corrupted: {message}")]
    Corrupted { message: String },
}

/// IPC communication errors
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to bind IPC socket {path:?}")]
    SocketCreation { path: PathBuf, source: std::io::Error },

    #[error("Failed to connect to daemon at {path:?}")]
    Connection { path: PathBuf, source: std::io::Error },

    #[error("Failed to send IPC message")]
    Send,

    #[error("Failed to receive IPC response")]
    Receive,

    #[error("Invalid IPC message format")]
    InvalidMessage,
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid duration: {duration}")]
    InvalidDuration { duration: String },

    #[error("Unknown display: {display}")]
    UnknownDisplay { display: u32 },

    #[error("Display {display} does not support input 0x{code:02x}")]
    UnsupportedInput { display: u32, code: u16 },

    #[error("Invalid input code: {code}")]
    InvalidInputCode { code: String },

    #[error("No menu entry {index}")]
    UnknownMenuEntry { index: usize },
}

// Convenience type alias
pub type Result<T> = std::result::Result<T, DdcswError>;

impl From<serde_json::Error> for DdcswError {
    fn from(err: serde_json::Error) -> Self {
        DdcswError::Cache(CacheError::Corrupted {
            message: err.to_string(),
        })
    }
}

impl From<toml::de::Error> for DdcswError {
    fn from(err: toml::de::Error) -> Self {
        DdcswError::Config(ConfigError::TomlParse {
            message: err.to_string(),
        })
    }
}

impl DdcswError {
    /// True when the failure means ddcutil itself is missing.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, DdcswError::Tool(ToolError::NotFound { .. }))
    }
}

// Error reporting utilities
pub trait ErrorReporting {
    fn log_error(&self, context: &str);
    fn user_friendly_message(&self) -> String;
}

impl ErrorReporting for DdcswError {
    fn log_error(&self, context: &str) {
        log::error!("{}: {:?}", context, self);
    }

    fn user_friendly_message(&self) -> String {
        match self {
            DdcswError::Config(ConfigError::FileRead { path, .. }) => {
                format!("Configuration file could not be read: {:?}", path)
            }
            DdcswError::Config(ConfigError::TomlParse { message }) => {
                format!("Invalid configuration format: {}", message)
            }
            DdcswError::Tool(ToolError::NotFound { tool }) => {
                format!("{} is not installed or not in PATH", tool)
            }
            DdcswError::Tool(ToolError::NonZeroExit { code, stderr, .. }) => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    format!("ddcutil reported an error (exit code {})", code)
                } else {
                    format!("ddcutil reported an error (exit code {}): {}", code, stderr)
                }
            }
            DdcswError::Ipc(IpcError::Connection { .. }) => {
                "ddcsw daemon is not running. Please start ddcsw-daemon first.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Adds a short description to errors surfaced through `anyhow` in the binaries.
pub trait ErrorContext<T> {
    fn describe<C>(self, context: C) -> anyhow::Result<T>
    where
        C: fmt::Display + Send + Sync + 'static;
}

impl<T> ErrorContext<T> for Result<T> {
    fn describe<C>(self, context: C) -> anyhow::Result<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| anyhow::anyhow!("{}: {}", context, e.user_friendly_message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_tool_missing_message() {
        let error = DdcswError::Tool(ToolError::NotFound {
            tool: "ddcutil".to_string(),
        });

        assert!(error.is_tool_missing());
        let message = error.user_friendly_message();
        assert!(message.contains("ddcutil is not installed"));
    }

    #[test]
    fn test_non_zero_exit_message() {
        let error = DdcswError::Tool(ToolError::NonZeroExit {
            command: "ddcutil detect".to_string(),
            code: 1,
            stderr: "No /dev/i2c devices exist.".to_string(),
        });

        assert!(!error.is_tool_missing());
        let message = error.user_friendly_message();
        assert!(message.contains("exit code 1"));
        assert!(message.contains("No /dev/i2c devices exist."));
    }

    #[test]
    fn test_config_error_user_friendly_message() {
        let error = ConfigError::FileRead {
            path: PathBuf::from("/nonexistent/config.toml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied"),
        };
        let message = DdcswError::Config(error).user_friendly_message();
        assert!(message.contains("/nonexistent/config.toml"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = DdcswError::Validation(ValidationError::UnsupportedInput {
            display: 2,
            code: 0x0f,
        });
        assert_eq!(
            error.to_string(),
            "Validation error: Display 2 does not support input 0x0f"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<Vec<u8>>("not json").unwrap_err();
        let error: DdcswError = json_error.into();

        match error {
            DdcswError::Cache(CacheError::Corrupted { .. }) => {}
            _ => panic!("Expected CacheError::Corrupted"),
        }
    }

    #[test]
    fn test_describe_adds_context() {
        let result: Result<()> = Err(DdcswError::Tool(ToolError::NotFound {
            tool: "ddcutil".to_string(),
        }));
        let error = result.describe("Detection failed").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Detection failed: ddcutil is not installed or not in PATH"
        );
    }
}
