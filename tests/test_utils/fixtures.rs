//! Test fixtures for parser scenarios

use std::sync::{Arc, Mutex};

use serial_shell_parser::{ParserSettings, RecordingTransport, ShellParser};

/// The default Zephyr prompt as the shell prints it
pub const PROMPT: &str = "uart:~$ ";

/// Values gathered by callbacks
pub type Collected<T> = Arc<Mutex<Vec<T>>>;

pub fn collect<T>() -> Collected<T> {
    Arc::new(Mutex::new(Vec::new()))
}

/// The prompt wrapped in the colour codes the Zephyr shell uses
pub fn prompt_bytes() -> Vec<u8> {
    format!("\x1b[1;32m{}\x1b[m", PROMPT).into_bytes()
}

/// A parser that has seen the prompt, with the reset writes discarded
pub fn idle_parser(settings: &ParserSettings) -> (ShellParser<RecordingTransport>, RecordingTransport) {
    let transport = RecordingTransport::open();
    let mut parser =
        ShellParser::new(transport.clone(), settings).expect("settings should be valid");
    parser.handle_data(&prompt_bytes());
    assert!(!parser.is_paused(), "parser should be idle after the prompt");
    transport.clear_writes();
    (parser, transport)
}

/// What an echoing shell prints for `command`, ending at the next prompt
pub fn shell_output(command: &str, response_lines: &[&str]) -> Vec<u8> {
    let mut out = format!("{}\r\n", command);
    for line in response_lines {
        out.push_str(line);
        out.push_str("\r\n");
    }
    let mut bytes = out.into_bytes();
    bytes.extend(prompt_bytes());
    bytes
}

/// Feed the shell's answer to `command`
pub fn respond(parser: &mut ShellParser<RecordingTransport>, command: &str, response_lines: &[&str]) {
    parser.handle_data(&shell_output(command, response_lines));
}

/// A log line in the default Zephyr format
pub fn zephyr_log(level: &str, module: &str, message: &str) -> String {
    format!("[00:00:01.250,000] <{}> {}: {}", level, module, message)
}
