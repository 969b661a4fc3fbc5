use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{DdcswError, ToolError};
use crate::Result;

/// Exit code reported when the tool could not be found.
pub const EXIT_TOOL_MISSING: i32 = 127;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn tool_missing(&self) -> bool {
        self.exit_code == EXIT_TOOL_MISSING
    }

    /// Turns a failed run into the matching error.
    pub fn check(self, tool: &str, command: &str) -> Result<ToolOutput> {
        if self.success() {
            Ok(self)
        } else if self.tool_missing() {
            Err(DdcswError::Tool(ToolError::NotFound { tool: tool.to_string() }))
        } else {
            Err(DdcswError::Tool(ToolError::NonZeroExit {
                command: command.to_string(),
                code: self.exit_code,
                stderr: self.stderr,
            }))
        }
    }
}

/// Runs one ddcutil invocation to completion.
#[async_trait::async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<ToolOutput>;

    /// Name used in messages.
    fn tool_name(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    tool: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    pub fn new(tool: PathBuf, timeout: Option<Duration>) -> Self {
        Self { tool, timeout }
    }

    /// Resolves a bare tool name through PATH. An unresolved name is kept as-is
    /// so the missing tool surfaces as exit code 127 at run time.
    pub fn resolve_tool(tool: &str) -> PathBuf {
        match which::which(tool) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("{} not found in PATH: {}", tool, e);
                PathBuf::from(tool)
            }
        }
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.tool.display(), args.join(" "))
    }
}

#[async_trait::async_trait]
impl ToolRunner for ProcessExecutor {
    async fn run(&self, args: &[String]) -> Result<ToolOutput> {
        let command_line = self.command_line(args);
        let mut cmd = Command::new(&self.tool);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!("Executing: {}", command_line);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("{} is not installed", self.tool.display());
                return Ok(ToolOutput {
                    exit_code: EXIT_TOOL_MISSING,
                    stdout: String::new(),
                    stderr: e.to_string(),
                });
            }
            Err(e) => {
                return Err(DdcswError::Tool(ToolError::Spawn {
                    command: command_line,
                    source: e,
                }));
            }
        };

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    log::error!("{} timed out after {:?}", command_line, limit);
                    return Err(DdcswError::Tool(ToolError::Timeout {
                        command: command_line,
                        seconds: limit.as_secs(),
                    }));
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| {
            DdcswError::Tool(ToolError::Spawn {
                command: command_line.clone(),
                source: e,
            })
        })?;

        let exit_code = match output.status.code() {
            Some(code) => code,
            None => {
                return Err(DdcswError::Tool(ToolError::Killed { command: command_line }));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if exit_code == 0 {
            log::debug!("{} succeeded", command_line);
        } else {
            log::warn!("{} failed with exit code {}: {}", command_line, exit_code, stderr.trim());
        }

        Ok(ToolOutput { exit_code, stdout, stderr })
    }

    fn tool_name(&self) -> String {
        self.tool
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.tool.to_string_lossy().to_string())
    }
}
