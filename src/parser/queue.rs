//! Command Queue
//!
//! Strict FIFO of caller-submitted commands. Only the head may be in flight.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::callbacks::ResponseCallbacks;
use crate::error::{Error, Result};

/// One submitted command awaiting transmission or a response
#[derive(Debug)]
pub struct PendingRequest {
    command: String,
    callbacks: Vec<ResponseCallbacks>,
    sent_at: Option<Instant>,
    timeout: Option<Duration>,
}

impl PendingRequest {
    fn new(command: String, timeout: Option<Duration>) -> Self {
        Self {
            command,
            callbacks: Vec::new(),
            sent_at: None,
            timeout,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    pub fn sent_at(&self) -> Option<Instant> {
        self.sent_at
    }

    /// Override timeout, if one was given on submission
    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn callback_sets(&self) -> usize {
        self.callbacks.len()
    }

    pub(crate) fn mark_sent(&mut self, at: Instant) {
        self.sent_at = Some(at);
    }

    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }

    /// When the request times out; `None` until it has been sent
    pub fn deadline(&self, default: Duration) -> Option<Instant> {
        self.sent_at
            .map(|sent_at| sent_at + self.effective_timeout(default))
    }

    pub fn is_expired(&self, now: Instant, default: Duration) -> bool {
        self.deadline(default).is_some_and(|deadline| now >= deadline)
    }

    pub(crate) fn notify_response(&mut self, response: &str, is_error: bool) {
        for callbacks in self.callbacks.iter_mut() {
            callbacks.notify_response(response, &self.command, is_error);
        }
    }

    pub(crate) fn notify_timeout(&mut self, message: &str) {
        for callbacks in self.callbacks.iter_mut() {
            callbacks.notify_timeout(message, &self.command);
        }
    }
}

/// Result of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new request was appended
    Queued,
    /// Callbacks were attached to an identical queued request
    Merged,
}

/// FIFO of pending requests
#[derive(Debug, Default)]
pub struct CommandQueue {
    requests: VecDeque<PendingRequest>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request, or with `unique` attach to an identical queued one
    pub fn enqueue(
        &mut self,
        command: &str,
        callbacks: Option<ResponseCallbacks>,
        timeout: Option<Duration>,
        unique: bool,
    ) -> Result<EnqueueOutcome> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Error::EmptyCommand);
        }

        if unique {
            if let Some(existing) = self.requests.iter_mut().find(|r| r.command == command) {
                if timeout.is_some() && timeout != existing.timeout {
                    warn!(
                        "Command '{}' already queued with timeout {:?}; ignoring override {:?}",
                        command, existing.timeout, timeout
                    );
                }
                existing.callbacks.extend(callbacks);
                return Ok(EnqueueOutcome::Merged);
            }
        }

        let mut request = PendingRequest::new(command.to_string(), timeout);
        request.callbacks.extend(callbacks);
        self.requests.push_back(request);
        Ok(EnqueueOutcome::Queued)
    }

    pub fn head(&self) -> Option<&PendingRequest> {
        self.requests.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut PendingRequest> {
        self.requests.front_mut()
    }

    pub fn pop_head(&mut self) -> Option<PendingRequest> {
        self.requests.pop_front()
    }

    /// Pop the head if it is in flight and past its deadline
    pub fn take_expired(&mut self, now: Instant, default: Duration) -> Option<PendingRequest> {
        if self.head()?.is_expired(now, default) {
            self.requests.pop_front()
        } else {
            None
        }
    }

    pub fn next_deadline(&self, default: Duration) -> Option<Instant> {
        self.head()?.deadline(default)
    }

    /// Queued command texts, head first
    pub fn commands(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.command.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}
