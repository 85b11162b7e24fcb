//! Shell Protocol Parser
//!
//! [`ShellParser`] turns the bytes a device shell prints into correlated
//! command/response transactions, log notifications and flow-control state.
//!
//! Data flows strictly forward: bytes → lines ([`VirtualLineBuffer`]) →
//! segments ([`CommandAccumulator`]) → classified responses → callbacks.
//! Flow-control state flows back only to gate when the queue may transmit.
//!
//! The parser is synchronous and owns all of its state, so several parsers
//! (one per transport) never interfere. Timeouts are driven from outside via
//! [`ShellParser::poll_timeouts`] and [`ShellParser::next_deadline`]; the
//! [`session`](crate::session) module provides a tokio driver for both.

pub mod accumulator;
pub mod callbacks;
pub mod classifier;
pub mod queue;

pub use accumulator::{AccumulatorOutput, CommandAccumulator};
pub use callbacks::{DurableRegistry, RegistrationId, ResponseCallbacks, TextCallback};
pub use queue::{CommandQueue, EnqueueOutcome, PendingRequest};

use chrono::Utc;
use std::time::{Duration, Instant};

use crate::config::{CompiledSettings, ParserSettings};
use crate::error::{Error, Result};
use crate::events::{
    CommandResponse, EventCategory, EventRegistry, ListenerId, ShellLogEvent, UnknownOutput,
};
use crate::terminal::prompt::utils::is_pure_prompt;
use crate::terminal::{LineEmulator, VirtualLineBuffer, VirtualTerminal};
use crate::transport::{Transport, TransportEvent};

/// Form feed: the shell clears the screen and reprints its prompt
pub const FORM_FEED: u8 = 0x0C;

/// NAK (Ctrl-U): the shell discards the line being edited
pub const DELETE_LINE: u8 = 0x15;

/// Sent on attach to put the shell into a known line-editing state
pub const SHELL_RESET_SEQUENCE: [u8; 2] = [FORM_FEED, DELETE_LINE];

/// Line terminator appended to every transmitted command
pub const COMMAND_TERMINATOR: &str = "\r\n";

/// Command/response parser over one transport
pub struct ShellParser<T: Transport, E: LineEmulator = VirtualTerminal> {
    transport: T,
    settings: CompiledSettings,
    line_buffer: VirtualLineBuffer<E>,
    accumulator: CommandAccumulator,
    queue: CommandQueue,
    durable: DurableRegistry,
    paused_listeners: EventRegistry<bool>,
    log_listeners: EventRegistry<ShellLogEvent>,
    response_listeners: EventRegistry<CommandResponse>,
    unknown_listeners: EventRegistry<UnknownOutput>,
    /// Remote shell not known to be idle
    paused: bool,
    /// Prompt is the latest non-blank rendered line since our last write
    at_prompt: bool,
    shell_echos: bool,
    /// Written text standing in for the echo a non-echoing shell omits
    echo_buffer: String,
}

impl<T: Transport> ShellParser<T, VirtualTerminal> {
    /// Create a parser over `transport` with the default `vte` emulator
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the shell reset
    /// sequence cannot be written to an open transport.
    pub fn new(transport: T, settings: &ParserSettings) -> Result<Self> {
        Self::with_emulator(transport, settings, VirtualTerminal::new())
    }
}

impl<T: Transport, E: LineEmulator> ShellParser<T, E> {
    /// Create a parser with a specific terminal emulator
    ///
    /// # Errors
    ///
    /// Same as [`ShellParser::new`].
    pub fn with_emulator(transport: T, settings: &ParserSettings, emulator: E) -> Result<Self> {
        let settings = settings.compile()?;
        let shell_echos = settings.shell_echos;
        let mut parser = Self {
            transport,
            accumulator: CommandAccumulator::new(settings.shell_prompt.clone()),
            settings,
            line_buffer: VirtualLineBuffer::with_emulator(emulator),
            queue: CommandQueue::new(),
            durable: DurableRegistry::new(),
            paused_listeners: EventRegistry::new(EventCategory::PausedChanged),
            log_listeners: EventRegistry::new(EventCategory::ShellLog),
            response_listeners: EventRegistry::new(EventCategory::AnyCommandResponse),
            unknown_listeners: EventRegistry::new(EventCategory::UnknownCommand),
            paused: true,
            at_prompt: false,
            shell_echos,
            echo_buffer: String::new(),
        };

        if parser.transport.is_open() {
            debug!("Transport open, resetting remote shell line editor");
            parser.write_raw(&SHELL_RESET_SEQUENCE)?;
        }

        Ok(parser)
    }

    // === Transport events ===

    /// Route one transport event
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Data(data) => self.handle_data(&data),
            TransportEvent::DataWritten(data) => self.handle_data_written(&data),
            TransportEvent::Closed => self.handle_closed(),
        }
    }

    /// Process bytes received from the device, one byte at a time
    ///
    /// Without a configured prompt, the row left of the cursor is checked
    /// for one once the whole read has been consumed, never mid-read.
    pub fn handle_data(&mut self, data: &[u8]) {
        for &byte in data {
            if let Some(line) = self.line_buffer.push_byte(byte) {
                self.at_prompt = false;
                let outputs = self.accumulator.push_line(&line, &self.settings.log_regex);
                self.dispatch(outputs);
            }
            self.update_paused();
        }

        if !data.is_empty()
            && self.accumulator.prompt().is_none()
            && self
                .accumulator
                .discover_from_line(&self.line_buffer.cursor_line())
        {
            self.update_paused();
        }
    }

    /// Process a confirmation that bytes reached the device
    pub fn handle_data_written(&mut self, data: &[u8]) {
        if !self.shell_echos {
            let echo = simulated_echo(data);
            trace!("Simulating echo {:?}", echo);
            self.echo_buffer.push_str(&echo);
        }
        self.update_paused();
    }

    /// The transport went away; drop partial state and pause
    pub fn handle_closed(&mut self) {
        info!("Transport closed, {} request(s) still queued", self.queue.len());
        self.line_buffer.reset();
        self.accumulator.clear();
        self.echo_buffer.clear();
        self.at_prompt = false;
        self.set_paused(true);
    }

    // === Requests ===

    /// Queue a command and try to transmit it
    ///
    /// Returns once the command has been handed to the pipeline, not once it
    /// has been answered. With `unique`, callbacks are attached to an
    /// identical command that is still queued instead of queueing it twice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCommand`] for a blank command, or the transport
    /// error if transmitting the head of the queue failed.
    pub fn enqueue_request(
        &mut self,
        command: &str,
        callbacks: Option<ResponseCallbacks>,
        timeout: Option<Duration>,
        unique: bool,
    ) -> Result<()> {
        let outcome = self.queue.enqueue(command, callbacks, timeout, unique)?;
        debug!("Enqueued '{}' ({:?})", command.trim(), outcome);
        self.try_send()
    }

    /// Time out the in-flight request if its deadline has passed
    ///
    /// At most one request is expired per call. Returns whether one was.
    pub fn poll_timeouts(&mut self, now: Instant) -> bool {
        let Some(mut request) = self.queue.take_expired(now, self.settings.timeout) else {
            return false;
        };

        let elapsed = request
            .sent_at()
            .map(|sent_at| now.saturating_duration_since(sent_at))
            .unwrap_or_default();
        let message = Error::CommandTimeout {
            command: request.command().to_string(),
            duration: elapsed,
        }
        .to_string();

        warn!("{}", message);
        request.notify_timeout(&message);

        if let Err(e) = self.try_send() {
            error!("Failed to transmit next command after timeout: {}", e);
        }
        true
    }

    /// When the in-flight request will time out, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.next_deadline(self.settings.timeout)
    }

    /// Bind callbacks to every future response to `command`
    pub fn register_command_callback<S, F>(
        &mut self,
        command: &str,
        on_success: S,
        on_error: F,
    ) -> RegistrationId
    where
        S: FnMut(&str, &str) + Send + 'static,
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.durable.register(command, on_success, on_error)
    }

    /// Remove one durable registration; repeated calls are a no-op
    pub fn unregister_command_callback(&mut self, id: RegistrationId) -> bool {
        self.durable.unregister(id)
    }

    // === Broadcast subscriptions ===

    /// Subscribe to pause changes; the handler gets the current state at once
    pub fn on_paused_change<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&bool) + Send + 'static,
    {
        let id = self.paused_listeners.subscribe(handler);
        let paused = self.paused;
        self.paused_listeners.emit_to(id, &paused);
        id
    }

    pub fn on_shell_logging_event<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&ShellLogEvent) + Send + 'static,
    {
        self.log_listeners.subscribe(handler)
    }

    pub fn on_any_command_response<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&CommandResponse) + Send + 'static,
    {
        self.response_listeners.subscribe(handler)
    }

    pub fn on_unknown_command<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&UnknownOutput) + Send + 'static,
    {
        self.unknown_listeners.subscribe(handler)
    }

    /// Remove one broadcast listener; repeated calls are a no-op
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        match id.category() {
            EventCategory::PausedChanged => self.paused_listeners.unsubscribe(id),
            EventCategory::ShellLog => self.log_listeners.unsubscribe(id),
            EventCategory::AnyCommandResponse => self.response_listeners.unsubscribe(id),
            EventCategory::UnknownCommand => self.unknown_listeners.unsubscribe(id),
        }
    }

    // === Flow control ===

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Nudge a shell the parser believes is stuck busy
    ///
    /// Writes a form feed so the shell reprints its prompt. This is a
    /// corrective action only; the parser stays paused until the prompt
    /// actually shows up.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the write fails.
    pub fn un_pause(&mut self) -> Result<()> {
        info!("Nudging remote shell");
        self.write_raw(&[FORM_FEED])
    }

    /// Whether the remote shell echoes what it is sent
    pub fn set_shell_echos(&mut self, shell_echos: bool) {
        self.shell_echos = shell_echos;
        if shell_echos {
            self.echo_buffer.clear();
        }
    }

    pub fn shell_echos(&self) -> bool {
        self.shell_echos
    }

    /// Tear down: drop queued requests, durable registrations and listeners
    pub fn unregister(&mut self) {
        debug!(
            "Tearing down parser: {} queued, {} durable",
            self.queue.len(),
            self.durable.len()
        );
        self.queue.clear();
        self.durable.clear();
        self.paused_listeners.clear();
        self.log_listeners.clear();
        self.response_listeners.clear();
        self.unknown_listeners.clear();
        self.echo_buffer.clear();
    }

    // === Accessors ===

    /// The prompt, configured or discovered
    pub fn shell_prompt(&self) -> Option<&str> {
        self.accumulator.prompt()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Queued command texts, head first
    pub fn pending_commands(&self) -> Vec<String> {
        self.queue.commands()
    }

    pub fn settings(&self) -> &CompiledSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // === Internals ===

    /// Write to the transport; the shell is busy until it shows the prompt again
    fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.transport.write(data)?;
        self.at_prompt = false;
        self.set_paused(true);
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            self.paused = paused;
            debug!("Shell {}", if paused { "busy" } else { "idle" });
            self.paused_listeners.emit(&paused);
        }
    }

    /// Re-evaluate idle/busy from the last rendered row
    fn update_paused(&mut self) {
        let line = self.line_buffer.last_line();
        let at_prompt_line = self
            .accumulator
            .prompt()
            .is_some_and(|prompt| is_pure_prompt(&line, prompt));

        if at_prompt_line {
            self.at_prompt = true;
            let content = self.line_buffer.take_rendered();
            let outputs = self.accumulator.push_partial(&content, &self.settings.log_regex);
            self.dispatch(outputs);
        } else if !line.trim().is_empty() {
            self.at_prompt = false;
        }

        let paused = !self.at_prompt;
        if paused != self.paused {
            self.set_paused(paused);
            if !paused {
                if let Err(e) = self.try_send() {
                    error!("Failed to transmit queued command: {}", e);
                }
            }
        }
    }

    /// Transmit the head of the queue if the shell is idle
    fn try_send(&mut self) -> Result<()> {
        if self.paused {
            return Ok(());
        }

        let command = match self.queue.head() {
            Some(head) if !head.is_sent() => head.command().to_string(),
            _ => return Ok(()),
        };

        if !self.transport.is_open() {
            debug!("Transport closed, holding '{}'", command);
            return Ok(());
        }

        let payload = format!("{}{}", command, COMMAND_TERMINATOR);
        self.write_raw(payload.as_bytes())?;
        if let Some(head) = self.queue.head_mut() {
            head.mark_sent(Instant::now());
        }
        debug!("Sent '{}'", command);
        Ok(())
    }

    fn dispatch(&mut self, outputs: Vec<AccumulatorOutput>) {
        for output in outputs {
            match output {
                AccumulatorOutput::Log(text) => {
                    trace!("Log: {}", text);
                    self.log_listeners.emit(&ShellLogEvent {
                        text,
                        received_at: Utc::now(),
                    });
                }
                AccumulatorOutput::Segment(segment) => self.classify(&segment),
            }
        }
    }

    /// Match a complete segment against the queue head and durable registrations
    fn classify(&mut self, segment: &str) {
        let echo_simulated = !self.echo_buffer.is_empty();
        let segment = if echo_simulated {
            let echo = std::mem::take(&mut self.echo_buffer);
            format!("{}{}", echo, segment.trim_start())
        } else {
            segment.trim_start().to_string()
        };

        let is_error = self.settings.error_regex.is_match(&segment);
        let prompt = self.accumulator.prompt().unwrap_or_default().to_string();
        let columns = self.settings.column_width;
        let mut broadcast_sent = false;
        let mut matched = false;

        let head_response = match self.queue.head() {
            Some(head) if head.is_sent() => {
                classifier::match_echo(&segment, head.command(), &prompt, columns, echo_simulated)
            }
            _ => None,
        };

        if let Some(response) = head_response {
            if let Some(mut request) = self.queue.pop_head() {
                let command = request.command().to_string();
                debug!(
                    "Matched '{}' ({})",
                    command,
                    if is_error { "error" } else { "ok" }
                );
                request.notify_response(&response, is_error);
                self.emit_any_response(command, response, is_error);
                broadcast_sent = true;
                matched = true;

                if !self.paused {
                    if let Err(e) = self.try_send() {
                        error!("Failed to transmit queued command: {}", e);
                    }
                }
            }
        }

        let mut durable_hits = Vec::new();
        for registration in self.durable.iter_mut() {
            if let Some(response) = classifier::match_echo(
                &segment,
                registration.command(),
                &prompt,
                columns,
                echo_simulated,
            ) {
                registration.notify(&response, is_error);
                durable_hits.push((registration.command().to_string(), response));
            }
        }

        if let Some((command, response)) = durable_hits.into_iter().next() {
            matched = true;
            if !broadcast_sent {
                self.emit_any_response(command, response, is_error);
            }
        }

        let text = segment.trim();
        if !matched && !text.is_empty() {
            debug!("Unknown output: {:?}", text);
            self.unknown_listeners.emit(&UnknownOutput {
                text: text.to_string(),
                received_at: Utc::now(),
            });
        }
    }

    fn emit_any_response(&mut self, command: String, response: String, is_error: bool) {
        self.response_listeners.emit(&CommandResponse {
            command,
            response,
            is_error,
            received_at: Utc::now(),
        });
    }
}

/// Written bytes as the echo a shell would have printed
fn simulated_echo(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .collect()
}

impl<T: Transport, E: LineEmulator> std::fmt::Debug for ShellParser<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellParser")
            .field("prompt", &self.accumulator.prompt())
            .field("paused", &self.paused)
            .field("queued", &self.queue.len())
            .field("durable", &self.durable.len())
            .field("shell_echos", &self.shell_echos)
            .finish_non_exhaustive()
    }
}
