//! Error types for external tool invocation and log parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors raised while parsing a per-frame score log.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogParseError {
    #[error("no frames parsed for label '{label}'")]
    Empty { label: String },

    #[error("non-contiguous frame index for label '{label}': expected {expected}, found {found}")]
    NonContiguous {
        label: String,
        expected: usize,
        found: usize,
    },

    #[error("unparseable log line {line_no} for label '{label}'")]
    BadLine { label: String, line_no: usize },
}

/// Errors that can occur while running external quality tools.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("tool '{0}' not found in PATH")]
    ToolNotFound(String),

    #[error("tool '{tool}' failed (exit code {exit_code:?})")]
    ToolFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("tool '{tool}' produced no log at {path}")]
    MissingLog { tool: String, path: PathBuf },

    #[error("tool '{0}' timed out after {1} seconds")]
    Timeout(String, u64),

    #[error("log parse error: {0}")]
    LogParse(#[from] LogParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a tool failure error.
    pub fn tool_failed(
        tool: impl Into<String>,
        exit_code: Option<i32>,
        stderr: Option<String>,
    ) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            exit_code,
            stderr,
        }
    }
}
