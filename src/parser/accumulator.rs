//! Command Accumulator
//!
//! Collects rendered lines until the shell prompt shows up, then cuts the
//! text into complete command-and-response segments. Log lines are pulled
//! out as soon as they appear.

use regex::Regex;

use crate::terminal::prompt::{utils::is_pure_prompt, PromptDetector};

/// Something the accumulator finished with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorOutput {
    /// An asynchronous log line, trimmed
    Log(String),
    /// Text that preceded a prompt: echo plus response
    Segment(String),
}

#[derive(Debug)]
pub struct CommandAccumulator {
    /// Text since the last prompt; never starts with the prompt
    buffer: String,
    /// Fixed once known
    prompt: Option<String>,
    detector: PromptDetector,
}

impl CommandAccumulator {
    pub fn new(prompt: Option<String>) -> Self {
        Self {
            buffer: String::new(),
            prompt,
            detector: PromptDetector::new(),
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Adopt the row under the cursor as the prompt if none is known yet
    ///
    /// `row` must be untrimmed so the prompt keeps the width it was drawn
    /// with.
    pub fn discover_from_line(&mut self, row: &str) -> bool {
        if self.prompt.is_some() {
            return false;
        }
        match self.detector.discover_line(row) {
            Some(prompt) => {
                self.adopt_prompt(prompt);
                true
            }
            None => false,
        }
    }

    /// Append a CR-LF terminated line
    pub fn push_line(&mut self, line: &str, log_regex: &Regex) -> Vec<AccumulatorOutput> {
        self.buffer.push_str(line);
        self.buffer.push('\n');
        self.process(log_regex)
    }

    /// Append rendered content that had no line terminator
    pub fn push_partial(&mut self, content: &str, log_regex: &Regex) -> Vec<AccumulatorOutput> {
        self.buffer.push_str(content);
        self.process(log_regex)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn adopt_prompt(&mut self, prompt: String) {
        info!("Discovered shell prompt {:?}", prompt);
        self.prompt = Some(prompt);
    }

    fn process(&mut self, log_regex: &Regex) -> Vec<AccumulatorOutput> {
        let mut outputs = Vec::new();

        if let Some(prompt) = &self.prompt {
            if is_pure_prompt(&self.buffer, prompt) {
                self.buffer.clear();
                return outputs;
            }
        }

        if log_regex.is_match(&self.buffer) {
            self.extract_logs(log_regex, &mut outputs);
        }

        if let Some(prompt) = self.prompt.clone() {
            self.split_segments(prompt.trim(), &mut outputs);
        }

        outputs
    }

    /// Emit every line matching the log pattern, keeping the rest
    fn extract_logs(&mut self, log_regex: &Regex, outputs: &mut Vec<AccumulatorOutput>) {
        let mut kept = String::with_capacity(self.buffer.len());
        for line in self.buffer.split_inclusive('\n') {
            if log_regex.is_match(line) {
                outputs.push(AccumulatorOutput::Log(line.trim().to_string()));
            } else {
                kept.push_str(line);
            }
        }

        if kept.trim().is_empty() {
            kept.clear();
        }
        self.buffer = kept;
    }

    /// Cut the buffer at each prompt; the tail stays buffered
    fn split_segments(&mut self, prompt: &str, outputs: &mut Vec<AccumulatorOutput>) {
        if prompt.is_empty() {
            return;
        }

        let mut rest = self.buffer.as_str();
        let mut segments = Vec::new();
        while let Some(pos) = rest.find(prompt) {
            let segment = &rest[..pos];
            // Skips empty and CR-LF-only segments
            if !segment.trim().is_empty() {
                segments.push(segment.to_string());
            }
            rest = &rest[pos + prompt.len()..];
        }

        let remainder = rest.trim_start().to_string();
        self.buffer = remainder;
        outputs.extend(segments.into_iter().map(AccumulatorOutput::Segment));
    }
}
