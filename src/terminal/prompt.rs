//! Prompt Detection Logic
//!
//! Discovers the remote shell's prompt from its output when it was not
//! configured up front.

use regex::Regex;

/// Permissive prompt shape: `name:path$`, optionally followed by a space
pub const DISCOVERY_PATTERN: &str = r"(?m)^[A-Za-z0-9_.\-]+:[~/A-Za-z0-9_.\-]*\$ ?";

/// Prompt detector for device shells
#[derive(Debug)]
pub struct PromptDetector {
    prompt_patterns: Vec<Regex>,
}

impl PromptDetector {
    /// Create a new prompt detector
    pub fn new() -> Self {
        let mut detector = Self {
            prompt_patterns: Vec::new(),
        };

        detector.add_pattern(DISCOVERY_PATTERN);
        detector
    }

    fn add_pattern(&mut self, pattern: &str) {
        match Regex::new(pattern) {
            Ok(regex) => self.prompt_patterns.push(regex),
            Err(e) => {
                warn!("Failed to compile regex pattern '{}': {}", pattern, e);
            }
        }
    }

    /// First prompt-shaped text found anywhere in accumulated output
    pub fn discover(&self, text: &str) -> Option<String> {
        self.prompt_patterns
            .iter()
            .find_map(|pattern| pattern.find(text))
            .map(|m| m.as_str().to_string())
    }

    /// The row as the shell drew it, if all of its visible text is a prompt
    ///
    /// `row` is the text left of the cursor. Trailing blanks are kept: they
    /// are part of the prompt's width when the shell wraps a long echo.
    pub fn discover_line(&self, row: &str) -> Option<String> {
        let row = row.trim_start();
        let visible = row.trim_end();
        if visible.is_empty() {
            return None;
        }
        self.discover(visible)
            .filter(|prompt| prompt.trim_end() == visible)
            .map(|_| row.to_string())
    }
}

impl Default for PromptDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Utilities for prompt analysis
pub mod utils {
    /// Whether a rendered line is exactly the prompt, ignoring padding
    pub fn is_pure_prompt(line: &str, prompt: &str) -> bool {
        let prompt = prompt.trim();
        !prompt.is_empty() && line.trim() == prompt
    }
}
