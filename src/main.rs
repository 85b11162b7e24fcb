//! shell-replay - feed a captured shell byte stream through the parser
//!
//! Reads raw bytes recorded from a device shell (a file or stdin), replays
//! them through a [`ShellParser`] and prints every log line, command response
//! and unrecognised output it produces.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, error, info, warn};

use serial_shell_parser::{
    describe_settings_error, load_settings, load_settings_from, ParserEvent, ParserSettings, RecordingTransport,
    ResponseCallbacks, ShellParser,
};

/// Bytes handed to the parser per simulated read
const REPLAY_CHUNK_SIZE: usize = 64;

/// Command line options
#[derive(Debug, Default)]
struct AppArgs {
    /// Settings file path
    config_path: Option<PathBuf>,
    /// Prompt override
    prompt: Option<String>,
    /// Commands to queue before replaying
    commands: Vec<String>,
    /// Emit JSON lines instead of text
    json: bool,
    /// The captured shell does not echo input
    no_echo: bool,
    /// Enable debug logging
    debug: bool,
    /// Capture file; stdin when absent
    capture: Option<PathBuf>,
}

impl AppArgs {
    /// Parse the process arguments
    fn parse() -> Result<Self> {
        Self::parse_from(env::args().skip(1))
    }

    fn parse_from<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut app_args = AppArgs::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let Some(path) = args.next() else {
                        bail!("Missing config file path");
                    };
                    app_args.config_path = Some(PathBuf::from(path));
                }
                "--prompt" | "-p" => {
                    let Some(prompt) = args.next() else {
                        bail!("Missing prompt");
                    };
                    app_args.prompt = Some(prompt);
                }
                "--command" | "-x" => {
                    let Some(command) = args.next() else {
                        bail!("Missing command");
                    };
                    app_args.commands.push(command);
                }
                "--json" | "-j" => {
                    app_args.json = true;
                }
                "--no-echo" => {
                    app_args.no_echo = true;
                }
                "--debug" | "-d" => {
                    app_args.debug = true;
                }
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-v" => {
                    println!("shell-replay v{}", serial_shell_parser::VERSION);
                    process::exit(0);
                }
                "-" => {
                    app_args.capture = None;
                }
                arg if arg.starts_with('-') => {
                    bail!("Unknown option: {}", arg);
                }
                _ => {
                    if app_args.capture.is_some() {
                        bail!("Only one capture file may be given");
                    }
                    app_args.capture = Some(PathBuf::from(arg));
                }
            }
        }

        Ok(app_args)
    }
}

/// Print help information
fn print_help() {
    println!("shell-replay - replay a captured device shell session through the parser");
    println!();
    println!("USAGE:");
    println!("    shell-replay [OPTIONS] [CAPTURE]");
    println!();
    println!("ARGS:");
    println!("    <CAPTURE>              Raw byte capture; reads stdin when absent or '-'");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to a settings file (TOML or JSON)");
    println!("    -p, --prompt <PROMPT>  Shell prompt, overrides the settings file");
    println!("    -x, --command <CMD>    Queue a command before replaying (repeatable)");
    println!("    -j, --json             Print events as JSON lines");
    println!("        --no-echo          The captured shell does not echo input");
    println!("    -d, --debug            Enable debug logging");
    println!("    -h, --help             Print this help message");
    println!("    -v, --version          Print version information");
    println!();
    println!("ENVIRONMENT:");
    println!("    SHELL_PARSER_CONFIG    Path to a settings file");
    println!("    RUST_LOG               Set logging level (error, warn, info, debug, trace)");
}

fn main() -> Result<()> {
    let args = AppArgs::parse().unwrap_or_else(|e| {
        eprintln!("Failed to parse arguments: {}", e);
        print_help();
        process::exit(1);
    });

    let log_level = if args.debug { "debug" } else { "info" };
    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();

    info!("Starting shell-replay v{}", serial_shell_parser::VERSION);

    let settings = load_configuration(&args)?;
    let capture = read_capture(&args)?;
    debug!("Replaying {} bytes", capture.len());

    let summary = replay(&args, &settings, &capture)?;
    if summary.timed_out > 0 {
        warn!("{} command(s) timed out", summary.timed_out);
    }
    if summary.pending > 0 {
        warn!("{} command(s) were never sent", summary.pending);
    }

    info!("Replay complete");
    Ok(())
}

/// Settings from `--config`, the default locations or built-in defaults
fn load_configuration(args: &AppArgs) -> Result<ParserSettings> {
    let mut settings = match &args.config_path {
        Some(path) => {
            load_settings_from(path).map_err(|e| anyhow!(describe_settings_error(&e)))?
        }
        None => load_settings(),
    };

    if let Some(prompt) = &args.prompt {
        debug!("Applying prompt override: {:?}", prompt);
        settings.shell_prompt = Some(prompt.clone());
    }
    if args.no_echo {
        settings.shell_echos = false;
    }

    settings.validate().context("Invalid parser settings")?;
    Ok(settings)
}

fn read_capture(args: &AppArgs) -> Result<Vec<u8>> {
    match &args.capture {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read capture {}", path.display()))
        }
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read capture from stdin")?;
            Ok(buffer)
        }
    }
}

fn print_event(event: &ParserEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize event: {}", e),
        }
        return;
    }

    match event {
        ParserEvent::Paused { paused } => {
            println!("[{}]", if *paused { "busy" } else { "idle" })
        }
        ParserEvent::Log(log) => println!("[log] {}", log.text),
        ParserEvent::Response(response) => println!(
            "[{}] {} -> {}",
            if response.is_error { "error" } else { "response" },
            response.command,
            response.response
        ),
        ParserEvent::Unknown(unknown) => println!("[unknown] {}", unknown.text),
    }
}

/// What was left over once a capture ended
#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    /// Commands whose response never showed up in the capture
    timed_out: usize,
    /// Commands still queued, never transmitted
    pending: usize,
}

/// Run the capture through a parser
fn replay(args: &AppArgs, settings: &ParserSettings, capture: &[u8]) -> Result<ReplaySummary> {
    let transport = RecordingTransport::open();
    let mut parser = ShellParser::new(transport.clone(), settings)?;
    let json = args.json;

    if args.debug {
        parser.on_paused_change(move |paused| {
            print_event(&ParserEvent::Paused { paused: *paused }, json)
        });
    }
    parser.on_shell_logging_event(move |log| print_event(&ParserEvent::Log(log.clone()), json));
    parser.on_any_command_response(move |response| {
        print_event(&ParserEvent::Response(response.clone()), json)
    });
    parser.on_unknown_command(move |unknown| {
        print_event(&ParserEvent::Unknown(unknown.clone()), json)
    });

    for command in &args.commands {
        let callbacks = ResponseCallbacks::new().on_timeout(|message, _| warn!("{}", message));
        parser.enqueue_request(command, Some(callbacks), None, false)?;
    }

    for chunk in capture.chunks(REPLAY_CHUNK_SIZE) {
        for written in transport.writes() {
            parser.handle_data_written(&written);
        }
        transport.clear_writes();
        parser.handle_data(chunk);
    }

    // The capture is over, so nothing in flight can still be answered
    let mut summary = ReplaySummary::default();
    while let Some(deadline) = parser.next_deadline() {
        if !parser.poll_timeouts(deadline) {
            break;
        }
        summary.timed_out += 1;
    }
    summary.pending = parser.queue_len();

    if let Some(prompt) = parser.shell_prompt() {
        debug!("Shell prompt: {:?}", prompt);
    } else {
        warn!("No shell prompt was seen in the capture");
    }

    Ok(summary)
}
