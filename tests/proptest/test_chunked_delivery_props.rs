//! Property-based tests: how the byte stream is split into reads must not
//! change what the parser reports

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use serial_shell_parser::{ParserSettings, RecordingTransport, ResponseCallbacks, ShellParser};
use test_utils::{prompt_bytes, shell_output, zephyr_log};

/// Everything observable from one replay
#[derive(Debug, Default, PartialEq)]
struct Observed {
    responses: Vec<String>,
    logs: Vec<String>,
    unknown: Vec<String>,
    writes: Vec<String>,
    paused: bool,
}

fn transcript(commands: &[(String, String)], with_logs: bool) -> Vec<u8> {
    let mut bytes = prompt_bytes();
    for (index, (command, response)) in commands.iter().enumerate() {
        let log = zephyr_log("inf", "app", &format!("tick {index}"));
        let lines: Vec<&str> = if with_logs && index % 2 == 0 {
            vec![log.as_str(), response.as_str()]
        } else {
            vec![response.as_str()]
        };
        bytes.extend(shell_output(command, &lines));
    }
    bytes
}

/// Replay `bytes`, cutting it at the given offsets
fn replay(commands: &[(String, String)], bytes: &[u8], cuts: &[usize]) -> Observed {
    let transport = RecordingTransport::open();
    let mut parser = ShellParser::new(transport.clone(), &ParserSettings::default()).unwrap();
    transport.clear_writes();

    let observed = Arc::new(Mutex::new(Observed::default()));
    let sink = Arc::clone(&observed);
    parser.on_shell_logging_event(move |event| sink.lock().unwrap().logs.push(event.text.clone()));
    let sink = Arc::clone(&observed);
    parser.on_unknown_command(move |event| sink.lock().unwrap().unknown.push(event.text.clone()));

    for (command, _) in commands {
        let sink = Arc::clone(&observed);
        let callbacks = ResponseCallbacks::new().on_success(move |response, command| {
            sink.lock()
                .unwrap()
                .responses
                .push(format!("{command} -> {response}"))
        });
        parser
            .enqueue_request(command, Some(callbacks), None, false)
            .unwrap();
    }

    let mut cuts: Vec<usize> = cuts.iter().map(|cut| cut % (bytes.len() + 1)).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut start = 0;
    for cut in cuts.into_iter().chain(std::iter::once(bytes.len())) {
        parser.handle_data(&bytes[start..cut]);
        start = cut;
    }

    let paused = parser.is_paused();
    drop(parser);
    let mut observed = Arc::try_unwrap(observed)
        .ok()
        .expect("parser dropped")
        .into_inner()
        .unwrap();
    observed.writes = transport.written_text();
    observed.paused = paused;
    observed
}

fn commands_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-z]{2,8}( [a-z0-9]{1,6}){0,2}", "[A-Za-z0-9=.]{1,20}"), 1..5)
}

proptest! {
    #[test]
    fn test_chunking_does_not_change_results(
        commands in commands_strategy(),
        cuts in prop::collection::vec(any::<usize>(), 0..24),
        with_logs in any::<bool>(),
    ) {
        let bytes = transcript(&commands, with_logs);
        let whole = replay(&commands, &bytes, &[]);
        let chunked = replay(&commands, &bytes, &cuts);

        prop_assert_eq!(&chunked, &whole);
        prop_assert_eq!(whole.responses.len(), commands.len());
        prop_assert!(whole.unknown.is_empty());
        prop_assert!(!whole.paused);
    }

    #[test]
    fn test_byte_at_a_time_matches_whole(
        commands in commands_strategy(),
    ) {
        let bytes = transcript(&commands, true);
        let whole = replay(&commands, &bytes, &[]);
        let cuts: Vec<usize> = (1..bytes.len()).collect();
        let single = replay(&commands, &bytes, &cuts);

        prop_assert_eq!(single, whole);
    }

    #[test]
    fn test_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let transport = RecordingTransport::open();
        let mut parser = ShellParser::new(transport, &ParserSettings::default()).unwrap();
        parser.enqueue_request("help", None, None, false).unwrap();
        parser.handle_data(&bytes);
    }
}
