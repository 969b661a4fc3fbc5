use std::path::PathBuf;

use crate::monitor::INPUT_SOURCE_FEATURE;

/// Builds ddcutil argument lists.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    tool: PathBuf,
    extra_args: Vec<String>,
}

impl CommandBuilder {
    pub fn new(tool: PathBuf) -> Self {
        Self { tool, extra_args: Vec::new() }
    }

    /// Global arguments placed right after the tool name, e.g. `--sleep-multiplier 2`.
    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn tool(&self) -> &PathBuf {
        &self.tool
    }

    pub fn detect(&self) -> Vec<String> {
        self.with_globals(["detect".to_string()])
    }

    pub fn capabilities(&self, display: u32) -> Vec<String> {
        self.with_globals([
            "-d".to_string(),
            display.to_string(),
            "capabilities".to_string(),
        ])
    }

    pub fn get_input(&self, display: u32) -> Vec<String> {
        self.with_globals([
            "-d".to_string(),
            display.to_string(),
            "getvcp".to_string(),
            format!("{:x}", INPUT_SOURCE_FEATURE),
        ])
    }

    pub fn set_input(&self, display: u32, code: u16) -> Vec<String> {
        self.with_globals([
            "-d".to_string(),
            display.to_string(),
            "setvcp".to_string(),
            format!("{:x}", INPUT_SOURCE_FEATURE),
            format!("0x{:02x}", code),
        ])
    }

    /// Shell-like rendering of a command for logs and messages.
    pub fn command_line(&self, args: &[String]) -> String {
        let mut line = self.tool.to_string_lossy().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn with_globals<const N: usize>(&self, args: [String; N]) -> Vec<String> {
        let mut all = self.extra_args.clone();
        all.extend(args);
        all
    }
}
