//! Shell Session
//!
//! Async driver around a [`ShellParser`]. A single tokio task owns the parser
//! and serialises everything that touches it: transport events, API calls
//! from any number of handles, and the per-command timeout timer. Callers get
//! an async API that resolves once the parser has accepted the request.
//!
//! ```text
//! transport ── TransportEvent ──▶ ┌──────────────┐
//!                                 │ session task │──▶ callbacks / listeners
//! ShellSession ─ SessionCommand ─▶│ (ShellParser)│
//!              ◀── watch<paused> ─└──────────────┘
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::ParserSettings;
use crate::error::{Error, Result};
use crate::events::{CommandResponse, ListenerId, ShellLogEvent, UnknownOutput};
use crate::parser::{RegistrationId, ResponseCallbacks, ShellParser, TextCallback};
use crate::terminal::LineEmulator;
use crate::transport::{Transport, TransportEvent};

type Handler<E> = Box<dyn FnMut(&E) + Send>;

/// Listener to install on the parser
enum Subscriber {
    Paused(Handler<bool>),
    Log(Handler<ShellLogEvent>),
    Response(Handler<CommandResponse>),
    Unknown(Handler<UnknownOutput>),
}

/// Requests from handles to the session task
enum SessionCommand {
    Enqueue {
        command: String,
        callbacks: Option<ResponseCallbacks>,
        timeout: Option<Duration>,
        unique: bool,
        ack: oneshot::Sender<Result<()>>,
    },
    RegisterCommand {
        command: String,
        on_success: TextCallback,
        on_error: TextCallback,
        ack: oneshot::Sender<RegistrationId>,
    },
    Subscribe {
        subscriber: Subscriber,
        ack: oneshot::Sender<ListenerId>,
    },
    Remove {
        target: SubscriptionTarget,
        ack: oneshot::Sender<bool>,
    },
    UnPause {
        ack: oneshot::Sender<Result<()>>,
    },
    SetShellEchos(bool),
    Shutdown,
}

/// What a [`Subscription`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionTarget {
    Listener(ListenerId),
    Command(RegistrationId),
}

/// Final state of a command run through [`ShellSession::execute`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success(String),
    Error(String),
    /// Carries the timeout message
    Timeout(String),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success(_))
    }

    pub fn text(&self) -> &str {
        match self {
            CommandOutcome::Success(text)
            | CommandOutcome::Error(text)
            | CommandOutcome::Timeout(text) => text,
        }
    }
}

/// Handle for one listener or durable registration
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unregister`].
pub struct Subscription {
    commands: mpsc::UnboundedSender<SessionCommand>,
    target: SubscriptionTarget,
}

impl Subscription {
    pub fn target(&self) -> SubscriptionTarget {
        self.target
    }

    /// Stop delivery. Returns `false` if it was already removed or the
    /// session has shut down; calling it again is harmless.
    pub async fn unregister(&self) -> bool {
        let target = self.target;
        round_trip(&self.commands, |ack| SessionCommand::Remove { target, ack })
            .await
            .unwrap_or(false)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("target", &self.target)
            .finish()
    }
}

/// Async handle to a parser running on its own task
pub struct ShellSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    paused: watch::Receiver<bool>,
    task: Option<JoinHandle<()>>,
}

impl ShellSession {
    /// Build a parser over `transport` and start driving it
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect<T>(
        transport: T,
        settings: &ParserSettings,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let parser = ShellParser::new(transport, settings)?;
        Ok(Self::spawn(parser, events))
    }

    /// Move `parser` onto a new task fed by `events`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T, E>(
        mut parser: ShellParser<T, E>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self
    where
        T: Transport + 'static,
        E: LineEmulator + Send + 'static,
    {
        let (paused_tx, paused_rx) = watch::channel(parser.is_paused());
        parser.on_paused_change(move |paused| {
            paused_tx.send_replace(*paused);
        });

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(parser, events, commands_rx));

        Self {
            commands: commands_tx,
            paused: paused_rx,
            task: Some(task),
        }
    }

    /// Queue a command; resolves once the parser has accepted it
    pub async fn enqueue_request(
        &self,
        command: &str,
        callbacks: Option<ResponseCallbacks>,
        timeout: Option<Duration>,
        unique: bool,
    ) -> Result<()> {
        let command = command.to_string();
        round_trip(&self.commands, |ack| SessionCommand::Enqueue {
            command,
            callbacks,
            timeout,
            unique,
            ack,
        })
        .await?
    }

    /// Queue a command and wait for its response or timeout
    pub async fn execute(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutcome> {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let complete = |outcome: fn(String) -> CommandOutcome| {
            let slot = Arc::clone(&slot);
            move |text: &str, _command: &str| {
                if let Some(tx) = slot.lock().ok().and_then(|mut slot| slot.take()) {
                    let _ = tx.send(outcome(text.to_string()));
                }
            }
        };

        let callbacks = ResponseCallbacks::new()
            .on_success(complete(CommandOutcome::Success))
            .on_error(complete(CommandOutcome::Error))
            .on_timeout(complete(CommandOutcome::Timeout));

        self.enqueue_request(command, Some(callbacks), timeout, false)
            .await?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Bind callbacks to every future response to `command`
    pub async fn register_command_callback<S, F>(
        &self,
        command: &str,
        on_success: S,
        on_error: F,
    ) -> Result<Subscription>
    where
        S: FnMut(&str, &str) + Send + 'static,
        F: FnMut(&str, &str) + Send + 'static,
    {
        let command = command.to_string();
        let id = round_trip(&self.commands, |ack| SessionCommand::RegisterCommand {
            command,
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
            ack,
        })
        .await?;
        Ok(self.subscription(SubscriptionTarget::Command(id)))
    }

    /// Subscribe to pause changes; the handler gets the current state first
    pub async fn on_paused_change<F>(&self, handler: F) -> Result<Subscription>
    where
        F: FnMut(&bool) + Send + 'static,
    {
        self.subscribe(Subscriber::Paused(Box::new(handler))).await
    }

    pub async fn on_shell_logging_event<F>(&self, handler: F) -> Result<Subscription>
    where
        F: FnMut(&ShellLogEvent) + Send + 'static,
    {
        self.subscribe(Subscriber::Log(Box::new(handler))).await
    }

    pub async fn on_any_command_response<F>(&self, handler: F) -> Result<Subscription>
    where
        F: FnMut(&CommandResponse) + Send + 'static,
    {
        self.subscribe(Subscriber::Response(Box::new(handler))).await
    }

    pub async fn on_unknown_command<F>(&self, handler: F) -> Result<Subscription>
    where
        F: FnMut(&UnknownOutput) + Send + 'static,
    {
        self.subscribe(Subscriber::Unknown(Box::new(handler))).await
    }

    /// Last pause state reported by the parser
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn paused_watch(&self) -> watch::Receiver<bool> {
        self.paused.clone()
    }

    /// Wait until the remote shell is idle at its prompt
    pub async fn wait_idle(&self) -> Result<()> {
        let mut paused = self.paused.clone();
        paused
            .wait_for(|paused| !*paused)
            .await
            .map_err(|_| Error::SessionClosed)?;
        Ok(())
    }

    /// Ask the remote shell to reprint its prompt
    pub async fn un_pause(&self) -> Result<()> {
        round_trip(&self.commands, |ack| SessionCommand::UnPause { ack }).await?
    }

    pub fn set_shell_echos(&self, shell_echos: bool) -> Result<()> {
        self.commands
            .send(SessionCommand::SetShellEchos(shell_echos))
            .map_err(|_| Error::SessionClosed)
    }

    /// Whether the session task is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Tear down: stop the task, drop every registration and stop draining
    /// transport events. Safe to call more than once.
    pub async fn unregister(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let _ = self.commands.send(SessionCommand::Shutdown);
        if let Err(e) = task.await {
            error!("Shell session task failed: {}", e);
        }
    }

    async fn subscribe(&self, subscriber: Subscriber) -> Result<Subscription> {
        let id = round_trip(&self.commands, |ack| SessionCommand::Subscribe {
            subscriber,
            ack,
        })
        .await?;
        Ok(self.subscription(SubscriptionTarget::Listener(id)))
    }

    fn subscription(&self, target: SubscriptionTarget) -> Subscription {
        Subscription {
            commands: self.commands.clone(),
            target,
        }
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.commands.send(SessionCommand::Shutdown);
        }
    }
}

impl fmt::Debug for ShellSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellSession")
            .field("paused", &self.is_paused())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Send a command and wait for the task's answer
async fn round_trip<R>(
    commands: &mpsc::UnboundedSender<SessionCommand>,
    make: impl FnOnce(oneshot::Sender<R>) -> SessionCommand,
) -> Result<R> {
    let (ack, response) = oneshot::channel();
    commands.send(make(ack)).map_err(|_| Error::SessionClosed)?;
    response.await.map_err(|_| Error::SessionClosed)
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

async fn run_session<T, E>(
    mut parser: ShellParser<T, E>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
) where
    T: Transport,
    E: LineEmulator,
{
    info!("Shell session started");
    let mut events_open = true;

    loop {
        let deadline = parser.next_deadline();
        tokio::select! {
            event = events.recv(), if events_open => match event {
                Some(event) => parser.handle_event(event),
                None => {
                    debug!("Transport event channel closed");
                    events_open = false;
                }
            },
            command = commands.recv() => match command {
                Some(SessionCommand::Shutdown) | None => break,
                Some(command) => handle_command(&mut parser, command),
            },
            _ = sleep_until_deadline(deadline) => {
                parser.poll_timeouts(Instant::now());
            }
        }
    }

    parser.unregister();
    info!("Shell session stopped");
}

fn handle_command<T, E>(parser: &mut ShellParser<T, E>, command: SessionCommand)
where
    T: Transport,
    E: LineEmulator,
{
    match command {
        SessionCommand::Enqueue {
            command,
            callbacks,
            timeout,
            unique,
            ack,
        } => {
            let _ = ack.send(parser.enqueue_request(&command, callbacks, timeout, unique));
        }
        SessionCommand::RegisterCommand {
            command,
            on_success,
            on_error,
            ack,
        } => {
            let _ = ack.send(parser.register_command_callback(&command, on_success, on_error));
        }
        SessionCommand::Subscribe { subscriber, ack } => {
            let id = match subscriber {
                Subscriber::Paused(handler) => parser.on_paused_change(handler),
                Subscriber::Log(handler) => parser.on_shell_logging_event(handler),
                Subscriber::Response(handler) => parser.on_any_command_response(handler),
                Subscriber::Unknown(handler) => parser.on_unknown_command(handler),
            };
            let _ = ack.send(id);
        }
        SessionCommand::Remove { target, ack } => {
            let removed = match target {
                SubscriptionTarget::Listener(id) => parser.remove_listener(id),
                SubscriptionTarget::Command(id) => parser.unregister_command_callback(id),
            };
            let _ = ack.send(removed);
        }
        SessionCommand::UnPause { ack } => {
            let _ = ack.send(parser.un_pause());
        }
        SessionCommand::SetShellEchos(shell_echos) => parser.set_shell_echos(shell_echos),
        SessionCommand::Shutdown => {}
    }
}
