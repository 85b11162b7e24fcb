//! Serial Shell Parser - command/response parsing for device shells
//!
//! This library drives an interactive, line-oriented device shell (such as
//! the Zephyr RTOS shell) over a serial byte stream. It correlates commands
//! with their responses, separates asynchronous log lines from command
//! output and decides when it is safe to transmit the next command.
//!
//! ## Features
//!
//! - **Terminal Emulation:** Incoming bytes are rendered through a `vte`
//!   based virtual terminal, so cursor movement and line redraws resolve to
//!   the text a human would see
//! - **Flow Control:** Commands are only written while the shell sits idle at
//!   its prompt
//! - **Prompt Discovery:** The prompt can be configured or learned from the
//!   stream
//! - **Log Separation:** Lines matching a log pattern never end up in a
//!   command response
//! - **Timeouts:** Per-command deadlines with a configurable default
//! - **Configuration:** TOML or JSON settings files
//!
//! ## Module Organization
//!
//! - [`transport`] - The byte transport contract and an in-memory recorder
//! - [`terminal`] - Virtual terminal, line assembly and prompt discovery
//! - [`parser`] - Accumulation, classification, the command queue and
//!   [`ShellParser`] itself
//! - [`session`] - A tokio task driving a parser behind an async API
//! - [`events`] - Typed notification payloads and listener registries
//! - [`config`] - Parser settings and the settings file loader
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```
//! use serial_shell_parser::{ParserSettings, RecordingTransport, ResponseCallbacks, ShellParser};
//!
//! # fn main() -> serial_shell_parser::Result<()> {
//! let transport = RecordingTransport::open();
//! let mut parser = ShellParser::new(transport.clone(), &ParserSettings::default())?;
//!
//! // The shell shows its prompt and becomes idle
//! parser.handle_data(b"uart:~$ ");
//!
//! parser.enqueue_request(
//!     "kernel uptime",
//!     Some(ResponseCallbacks::new().on_success(|response, _| println!("{response}"))),
//!     None,
//!     false,
//! )?;
//! assert_eq!(transport.written_text().last().map(String::as_str), Some("kernel uptime\r\n"));
//!
//! parser.handle_data(b"kernel uptime\r\nUptime: 1234 ms\r\nuart:~$ ");
//! assert_eq!(parser.queue_len(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! [`ShellParser`] is synchronous and single-threaded: the owner feeds it
//! [`TransportEvent`]s and polls its timeout deadline. [`ShellSession`] moves
//! a parser onto a tokio task and serialises every access through channels,
//! so callbacks never run concurrently with parsing.

#![allow(unexpected_cfgs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;
pub mod events;
pub mod parser;
pub mod session;
pub mod terminal;
pub mod transport;

// Re-exports for core functionality
pub use config::{CompiledSettings, ParserSettings};
pub use error::{Error, Result};
pub use parser::{RegistrationId, ResponseCallbacks, ShellParser};
pub use session::{CommandOutcome, ShellSession, Subscription};
pub use transport::{RecordingTransport, Transport, TransportEvent};

// Convenience re-exports for common types
pub use config::loader::ConfigLoader;
pub use events::{CommandResponse, ListenerId, ParserEvent, ShellLogEvent, UnknownOutput};
pub use terminal::{LineEmulator, VirtualTerminal};

// Version information
/// The current version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The package name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// The package description from Cargo.toml
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Load parser settings from the default locations
///
/// Falls back to [`ParserSettings::default`] when no settings file exists or
/// the one found cannot be used.
///
/// # Examples
///
/// ```no_run
/// let settings = serial_shell_parser::load_settings();
/// assert!(settings.validate().is_ok());
/// ```
pub fn load_settings() -> ParserSettings {
    info!("Loading {} v{} settings", NAME, VERSION);

    match ConfigLoader::load() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Failed to load parser settings: {}. Using defaults", e);
            ParserSettings::default()
        }
    }
}

/// Load parser settings from an explicit file
///
/// # Errors
///
/// Unlike [`load_settings`], a missing or invalid file is an error.
pub fn load_settings_from(path: &std::path::Path) -> Result<ParserSettings> {
    if !path.exists() {
        return Err(Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: "Configuration file does not exist".to_string(),
        });
    }

    let settings = ConfigLoader::load_from_path(path)?;
    info!("Parser settings loaded from: {}", path.display());
    Ok(settings)
}

/// Human readable explanation for a settings error
pub fn describe_settings_error(error: &Error) -> String {
    match error {
        Error::ConfigLoadFailed { path, reason } => {
            format!(
                "Configuration Error: Failed to load settings from '{}': {}",
                path.display(),
                reason
            )
        }
        Error::ConfigParseFailed { format, reason } => {
            format!(
                "Configuration Error: Failed to parse {} settings: {}",
                format, reason
            )
        }
        Error::ConfigValidationFailed { field, reason } => {
            format!(
                "Configuration Error: Validation failed for '{}': {}",
                field, reason
            )
        }
        Error::ConfigNotFound => "Configuration Error: Settings file not found".to_string(),
        _ => format!("Unexpected Error: {}", error),
    }
}
