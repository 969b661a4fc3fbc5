pub mod monitor;
pub mod parser;
pub mod command_builder;
pub mod executor;
pub mod cache;
pub mod menu;
pub mod applet;
pub mod duration;
pub mod ipc;
pub mod error;

pub use monitor::{InputSource, Monitor, MonitorKey, INPUT_SOURCE_FEATURE};
pub use parser::{parse_capabilities, parse_current_input, parse_detect, Capabilities, DetectedDisplay};
pub use command_builder::CommandBuilder;
pub use executor::{ProcessExecutor, ToolOutput, ToolRunner, EXIT_TOOL_MISSING};
pub use cache::{CachedMonitor, MonitorCache};
pub use menu::{build_menu, DisplayPreferences, MenuItem, MenuState};
pub use applet::{Activation, Applet, AppletSettings};
pub use duration::parse_duration;
pub use ipc::{IpcClient, IpcServer, IpcCommand, IpcResponse};
pub use error::{DdcswError, Result, ErrorReporting, ErrorContext};

/// Parses an input code given as `0x0f`, `0f` or `15` (decimal only with no hex letters).
pub fn parse_input_code(value: &str) -> Result<u16> {
    let trimmed = value.trim();
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if trimmed.chars().any(|c| c.is_ascii_alphabetic()) {
        u16::from_str_radix(trimmed, 16).ok()
    } else {
        trimmed.parse().ok()
    };

    match parsed {
        Some(code) if code <= 0xff => Ok(code),
        _ => Err(DdcswError::Validation(error::ValidationError::InvalidInputCode {
            code: value.to_string(),
        })),
    }
}
