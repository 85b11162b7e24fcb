//! Integration Tests for Flow Control
//!
//! Transmission gating, timeouts, merging of duplicate requests and
//! recovery of a shell that never showed its prompt.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serial_shell_parser::parser::{FORM_FEED, SHELL_RESET_SEQUENCE};
use serial_shell_parser::{
    Error, ParserSettings, RecordingTransport, ResponseCallbacks, ShellParser, TransportEvent,
};
use test_utils::{collect, idle_parser, prompt_bytes, respond, Collected};

fn timeout_recorder(log: &Collected<String>) -> ResponseCallbacks {
    let success = Arc::clone(log);
    let timeout = Arc::clone(log);
    ResponseCallbacks::new()
        .on_success(move |response, command| {
            success.lock().unwrap().push(format!("ok {command}: {response}"))
        })
        .on_timeout(move |message, _| timeout.lock().unwrap().push(message.to_string()))
}

#[test]
fn test_new_parser_is_paused_and_resets_shell() {
    let transport = RecordingTransport::open();
    let mut parser = ShellParser::new(transport.clone(), &ParserSettings::default()).unwrap();

    assert!(parser.is_paused());
    assert_eq!(transport.writes(), vec![SHELL_RESET_SEQUENCE.to_vec()]);

    let states = collect();
    let sink = Arc::clone(&states);
    parser.on_paused_change(move |paused| sink.lock().unwrap().push(*paused));
    assert_eq!(*states.lock().unwrap(), vec![true]);

    parser.handle_data(&prompt_bytes());
    assert_eq!(*states.lock().unwrap(), vec![true, false]);
}

#[test]
fn test_nothing_written_before_prompt() {
    let transport = RecordingTransport::open();
    let mut parser = ShellParser::new(transport.clone(), &ParserSettings::default()).unwrap();
    transport.clear_writes();

    parser.enqueue_request("kernel uptime", None, None, false).unwrap();
    parser.handle_data(b"*** Booting Zephyr OS ***\r\n");
    assert!(transport.writes().is_empty());

    parser.handle_data(&prompt_bytes());
    assert_eq!(transport.written_text(), vec!["kernel uptime\r\n"]);
}

#[test]
fn test_one_command_in_flight() {
    let (mut parser, transport) = idle_parser(&ParserSettings::default());
    parser.enqueue_request("first", None, None, false).unwrap();
    parser.enqueue_request("second", None, None, false).unwrap();
    assert_eq!(transport.written_text(), vec!["first\r\n"]);

    // Output without a prompt leaves the shell busy
    parser.handle_data(b"first\r\nstill working\r\n");
    assert!(parser.is_paused());
    assert_eq!(transport.written_text(), vec!["first\r\n"]);
    assert_eq!(parser.pending_commands(), vec!["first", "second"]);

    parser.handle_data(&prompt_bytes());
    assert_eq!(transport.written_text(), vec!["first\r\n", "second\r\n"]);
}

#[test]
fn test_timeout_fires_at_deadline() {
    let (mut parser, _transport) = idle_parser(&ParserSettings::default());
    let log = collect();

    let before = Instant::now();
    parser
        .enqueue_request("slow", Some(timeout_recorder(&log)), None, false)
        .unwrap();
    let after = Instant::now();

    let deadline = parser.next_deadline().unwrap();
    let default = Duration::from_millis(1000);
    assert!(deadline >= before + default && deadline <= after + default);

    assert!(!parser.poll_timeouts(deadline - Duration::from_millis(1)));
    assert!(log.lock().unwrap().is_empty());

    assert!(parser.poll_timeouts(deadline));
    let messages = log.lock().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("'slow' timed out after"));
    assert_eq!(parser.queue_len(), 0);
    assert_eq!(parser.next_deadline(), None);
}

#[test]
fn test_timeout_override() {
    let (mut parser, _transport) = idle_parser(&ParserSettings::default());
    let before = Instant::now();
    parser
        .enqueue_request("quick", None, Some(Duration::from_millis(50)), false)
        .unwrap();

    let deadline = parser.next_deadline().unwrap();
    assert!(deadline >= before + Duration::from_millis(50));
    assert!(deadline < before + Duration::from_millis(1000));
}

#[test]
fn test_unsent_requests_never_time_out() {
    let transport = RecordingTransport::open();
    let mut parser = ShellParser::new(transport, &ParserSettings::default()).unwrap();
    let log = collect();
    parser
        .enqueue_request("held", Some(timeout_recorder(&log)), None, false)
        .unwrap();

    assert_eq!(parser.next_deadline(), None);
    assert!(!parser.poll_timeouts(Instant::now() + Duration::from_secs(3600)));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_one_timeout_per_poll_and_next_waits_for_prompt() {
    let (mut parser, transport) = idle_parser(&ParserSettings::default());
    let log = collect();
    parser
        .enqueue_request("first", Some(timeout_recorder(&log)), None, false)
        .unwrap();
    parser
        .enqueue_request("second", Some(timeout_recorder(&log)), None, false)
        .unwrap();

    let far_future = Instant::now() + Duration::from_secs(3600);
    assert!(parser.poll_timeouts(far_future));
    assert!(!parser.poll_timeouts(far_future));
    assert_eq!(log.lock().unwrap().len(), 1);

    // The shell never answered, so the next command waits for a prompt
    assert_eq!(transport.written_text(), vec!["first\r\n"]);
    parser.handle_data(&prompt_bytes());
    assert_eq!(transport.written_text(), vec!["first\r\n", "second\r\n"]);
}

#[test]
fn test_late_response_is_not_given_to_next_command() {
    let (mut parser, _transport) = idle_parser(&ParserSettings::default());
    let log = collect();
    let unknown = collect();
    let sink = Arc::clone(&unknown);
    parser.on_unknown_command(move |event| sink.lock().unwrap().push(event.text.clone()));

    parser
        .enqueue_request("first", Some(timeout_recorder(&log)), None, false)
        .unwrap();
    parser
        .enqueue_request("second", Some(timeout_recorder(&log)), None, false)
        .unwrap();
    assert!(parser.poll_timeouts(Instant::now() + Duration::from_secs(5)));

    respond(&mut parser, "first", &["late"]);
    assert_eq!(*unknown.lock().unwrap(), vec!["first\nlate"]);

    respond(&mut parser, "second", &["on time"]);
    let messages = log.lock().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1], "ok second: on time");
}

#[test]
fn test_unique_requests_merge_callbacks() {
    let (mut parser, transport) = idle_parser(&ParserSettings::default());
    let log = collect();

    parser.enqueue_request("busy", None, None, false).unwrap();
    parser
        .enqueue_request("status", Some(timeout_recorder(&log)), None, true)
        .unwrap();
    parser
        .enqueue_request(
            "status",
            Some(timeout_recorder(&log)),
            Some(Duration::from_secs(9)),
            true,
        )
        .unwrap();
    assert_eq!(parser.pending_commands(), vec!["busy", "status"]);

    respond(&mut parser, "busy", &["done"]);
    assert_eq!(transport.written_text(), vec!["busy\r\n", "status\r\n"]);
    respond(&mut parser, "status", &["all good"]);

    assert_eq!(
        *log.lock().unwrap(),
        vec!["ok status: all good", "ok status: all good"]
    );
}

#[test]
fn test_duplicates_without_unique_are_queued() {
    let (mut parser, _transport) = idle_parser(&ParserSettings::default());
    parser.enqueue_request("status", None, None, false).unwrap();
    parser.enqueue_request("status", None, None, false).unwrap();
    assert_eq!(parser.queue_len(), 2);
}

#[test]
fn test_empty_command_rejected() {
    let (mut parser, transport) = idle_parser(&ParserSettings::default());
    let result = parser.enqueue_request("  \r\n", None, None, false);
    assert!(matches!(result, Err(Error::EmptyCommand)));
    assert_eq!(parser.queue_len(), 0);
    assert!(transport.writes().is_empty());
}

#[test]
fn test_un_pause_recovers_a_stuck_shell() {
    let (mut parser, transport) = idle_parser(&ParserSettings::default());
    parser.handle_data(b"\r\ngarbage left on the line");
    assert!(parser.is_paused());

    parser.enqueue_request("kernel uptime", None, None, false).unwrap();
    assert!(transport.writes().is_empty());

    parser.un_pause().unwrap();
    assert_eq!(transport.writes(), vec![vec![FORM_FEED]]);
    assert!(parser.is_paused());

    // Form feed makes the shell clear the screen and reprint the prompt
    parser.handle_data(b"\x1b[H\x1b[2J");
    parser.handle_data(&prompt_bytes());
    assert_eq!(
        transport.written_text().last().map(String::as_str),
        Some("kernel uptime\r\n")
    );
}

#[test]
fn test_closed_transport_holds_commands() {
    let (mut parser, transport) = idle_parser(&ParserSettings::default());
    transport.set_open(false);
    parser.handle_event(TransportEvent::Closed);
    assert!(parser.is_paused());

    parser.enqueue_request("kernel uptime", None, None, false).unwrap();
    parser.handle_data(&prompt_bytes());
    assert!(transport.writes().is_empty());
    assert_eq!(parser.queue_len(), 1);

    transport.set_open(true);
    parser.handle_data(b"\r\n");
    parser.handle_data(&prompt_bytes());
    assert_eq!(transport.written_text(), vec!["kernel uptime\r\n"]);
}

#[test]
fn test_write_failure_is_reported_and_command_kept() {
    let (mut parser, transport) = idle_parser(&ParserSettings::default());
    transport.set_fail_writes(true);

    let result = parser.enqueue_request("kernel uptime", None, None, false);
    assert!(matches!(result, Err(Error::TransportWriteFailed { .. })));
    assert_eq!(parser.pending_commands(), vec!["kernel uptime"]);
    assert_eq!(parser.next_deadline(), None);
}

#[test]
fn test_teardown_drops_everything() {
    let (mut parser, transport) = idle_parser(&ParserSettings::default());
    let log = collect();
    parser
        .enqueue_request("a", Some(timeout_recorder(&log)), None, false)
        .unwrap();
    parser.enqueue_request("b", None, None, false).unwrap();
    let hits: Collected<String> = collect();
    let sink = Arc::clone(&hits);
    parser.register_command_callback(
        "a",
        move |response, _| sink.lock().unwrap().push(response.to_string()),
        |_, _| {},
    );

    parser.unregister();
    assert_eq!(parser.queue_len(), 0);
    assert!(!parser.poll_timeouts(Instant::now() + Duration::from_secs(60)));

    respond(&mut parser, "a", &["response"]);
    assert!(hits.lock().unwrap().is_empty());
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(transport.written_text(), vec!["a\r\n"]);
}
