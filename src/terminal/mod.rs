//! Terminal Emulation
//!
//! Byte-level front end of the parser: a `vte`-driven emulator, the line
//! buffer that assembles CR-LF terminated lines from it, and prompt discovery.

pub mod emulator;
pub mod line_buffer;
pub mod prompt;

// Re-exports for convenience
pub use emulator::{LineEmulator, VirtualTerminal};
pub use line_buffer::{ByteClass, VirtualLineBuffer};
pub use prompt::{utils as prompt_utils, PromptDetector};
