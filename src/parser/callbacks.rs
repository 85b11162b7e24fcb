//! Callback Registry
//!
//! One-shot callback sets attached to a single queued request, and durable
//! registrations bound to a command that fire every time it is answered.

use std::fmt;

/// Callback receiving `(text, command)`
pub type TextCallback = Box<dyn FnMut(&str, &str) + Send>;

/// Callbacks attached to one queued request
///
/// ```
/// use serial_shell_parser::ResponseCallbacks;
///
/// let callbacks = ResponseCallbacks::new()
///     .on_success(|response, command| println!("{command} -> {response}"))
///     .on_timeout(|message, _| eprintln!("{message}"));
/// # drop(callbacks);
/// ```
#[derive(Default)]
pub struct ResponseCallbacks {
    on_success: Option<TextCallback>,
    on_error: Option<TextCallback>,
    on_timeout: Option<TextCallback>,
}

impl ResponseCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(response, command)` for a non-error response
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Called with `(response, command)` when the response matches the error pattern
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called with `(message, command)` when no response arrived in time
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.on_timeout = Some(Box::new(f));
        self
    }

    pub(crate) fn notify_response(&mut self, response: &str, command: &str, is_error: bool) {
        let callback = if is_error {
            self.on_error.as_mut()
        } else {
            self.on_success.as_mut()
        };
        if let Some(callback) = callback {
            callback(response, command);
        }
    }

    pub(crate) fn notify_timeout(&mut self, message: &str, command: &str) {
        if let Some(callback) = self.on_timeout.as_mut() {
            callback(message, command);
        }
    }
}

impl fmt::Debug for ResponseCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCallbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .finish()
    }
}

/// Handle for one durable registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

/// Callbacks bound to a command for the lifetime of the registration
pub struct DurableRegistration {
    id: RegistrationId,
    command: String,
    on_success: TextCallback,
    on_error: TextCallback,
}

impl DurableRegistration {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub(crate) fn notify(&mut self, response: &str, is_error: bool) {
        if is_error {
            (self.on_error)(response, &self.command);
        } else {
            (self.on_success)(response, &self.command);
        }
    }
}

impl fmt::Debug for DurableRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableRegistration")
            .field("id", &self.id)
            .field("command", &self.command)
            .finish()
    }
}

/// Durable registrations in registration order
#[derive(Debug, Default)]
pub struct DurableRegistry {
    next_id: u64,
    registrations: Vec<DurableRegistration>,
}

impl DurableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register callbacks for a command. Several registrations may share a command.
    pub fn register<S, E>(&mut self, command: &str, on_success: S, on_error: E) -> RegistrationId
    where
        S: FnMut(&str, &str) + Send + 'static,
        E: FnMut(&str, &str) + Send + 'static,
    {
        let id = RegistrationId(self.next_id);
        self.next_id += 1;
        self.registrations.push(DurableRegistration {
            id,
            command: command.trim().to_string(),
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
        });
        id
    }

    /// Remove exactly one registration. Unknown or already removed ids are a no-op.
    pub fn unregister(&mut self, id: RegistrationId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|registration| registration.id != id);
        self.registrations.len() != before
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DurableRegistration> {
        self.registrations.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn clear(&mut self) {
        self.registrations.clear();
    }
}
