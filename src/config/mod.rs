//! Parser configuration
//!
//! Settings that shape how the byte stream is interpreted: the shell prompt,
//! the log-line and error-response patterns, the default command timeout and
//! the terminal width the remote shell wraps its echo at.

pub mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prompt printed by a Zephyr shell on its UART backend
pub const DEFAULT_SHELL_PROMPT: &str = "uart:~$ ";

/// Zephyr log line prefix, e.g. `[00:01:46.862,640] <inf> main: `
pub const DEFAULT_LOG_PATTERN: &str =
    r"\[[0-9]{2,}:[0-9]{2}:[0-9]{2}\.[0-9]{3},[0-9]{3}\] <([^<>]+)> ([^:]+): ";

/// Error responses, e.g. `error: invalid argument`
pub const DEFAULT_ERROR_PATTERN: &str = r"(?i)error: ";

/// Parser settings as stored in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserSettings {
    /// Shell prompt; discovered from the stream when absent
    pub shell_prompt: Option<String>,

    /// Pattern identifying asynchronous log lines
    pub log_pattern: String,

    /// Pattern identifying error responses
    pub error_pattern: String,

    /// Default per-command timeout in milliseconds
    pub timeout_ms: u64,

    /// Column width at which the remote shell wraps long lines
    pub column_width: usize,

    /// Whether the remote shell echoes typed characters
    pub shell_echos: bool,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            shell_prompt: Some(DEFAULT_SHELL_PROMPT.to_string()),
            log_pattern: DEFAULT_LOG_PATTERN.to_string(),
            error_pattern: DEFAULT_ERROR_PATTERN.to_string(),
            timeout_ms: 1000,
            column_width: 80,
            shell_echos: true,
        }
    }
}

impl ParserSettings {
    /// Settings with the given prompt and defaults for everything else
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            shell_prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Settings that learn the prompt from the stream
    pub fn with_prompt_discovery() -> Self {
        Self {
            shell_prompt: None,
            ..Self::default()
        }
    }

    /// Default timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate the settings without compiling them
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compile().map(|_| ())
    }

    /// Validate and compile the patterns
    pub fn compile(&self) -> Result<CompiledSettings, ConfigError> {
        if self.column_width == 0 {
            return Err(ConfigError::InvalidColumnWidth(self.column_width));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(self.timeout_ms));
        }
        if let Some(prompt) = &self.shell_prompt {
            if prompt.trim().is_empty() {
                return Err(ConfigError::BlankPrompt);
            }
        }

        let log_regex = Regex::new(&self.log_pattern).map_err(|source| {
            ConfigError::InvalidPattern {
                field: "log_pattern",
                source,
            }
        })?;
        let error_regex = Regex::new(&self.error_pattern).map_err(|source| {
            ConfigError::InvalidPattern {
                field: "error_pattern",
                source,
            }
        })?;

        Ok(CompiledSettings {
            shell_prompt: self.shell_prompt.clone(),
            log_regex,
            error_regex,
            timeout: self.timeout(),
            column_width: self.column_width,
            shell_echos: self.shell_echos,
        })
    }
}

/// Settings with their patterns compiled, owned by one parser instance
#[derive(Debug, Clone)]
pub struct CompiledSettings {
    pub shell_prompt: Option<String>,
    pub log_regex: Regex,
    pub error_regex: Regex,
    pub timeout: Duration,
    pub column_width: usize,
    pub shell_echos: bool,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid column width: {0} (must be at least 1)")]
    InvalidColumnWidth(usize),

    #[error("Invalid timeout: {0} ms (must be at least 1)")]
    InvalidTimeout(u64),

    #[error("Shell prompt must not be blank")]
    BlankPrompt,

    #[error("Invalid {field}: {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
}

impl ConfigError {
    /// Name of the offending settings field
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::InvalidColumnWidth(_) => "column_width",
            ConfigError::InvalidTimeout(_) => "timeout_ms",
            ConfigError::BlankPrompt => "shell_prompt",
            ConfigError::InvalidPattern { field, .. } => *field,
        }
    }
}
