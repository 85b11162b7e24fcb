//! Response Classifier helpers
//!
//! Pure functions from a command (and the prompt/width it was echoed under)
//! to a matcher for the echo that starts a segment. Matchers are built per
//! call and never cached.

use regex::Regex;

/// Reproduce how the remote shell wraps `prompt + command` at `columns`,
/// then strip the prompt back off.
pub fn wrap_echo(command: &str, prompt: &str, columns: usize) -> String {
    let columns = columns.max(1);
    let full: Vec<char> = prompt.chars().chain(command.chars()).collect();
    let wrapped = full
        .chunks(columns)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n");

    match wrapped.strip_prefix(prompt) {
        Some(rest) => rest.to_string(),
        None => wrapped,
    }
}

/// Whether the echo of `command` spills past one terminal row
pub fn needs_wrap(command: &str, prompt: &str, columns: usize) -> bool {
    command.chars().count() + prompt.chars().count() > columns
}

/// The text a segment is expected to start with for `command`
///
/// A simulated echo comes straight from the written bytes and is never
/// wrapped.
pub fn expected_echo(command: &str, prompt: &str, columns: usize, echo_simulated: bool) -> String {
    if !echo_simulated && needs_wrap(command, prompt, columns) {
        wrap_echo(command, prompt, columns)
    } else {
        command.to_string()
    }
}

/// Anchored prefix matcher for the literal echo text
pub fn echo_matcher(expected: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^{}", regex::escape(expected)))
}

/// Response text following the echo, trimmed; `None` if the echo is absent
pub fn strip_echo(segment: &str, matcher: &Regex) -> Option<String> {
    matcher
        .find(segment)
        .map(|m| segment[m.end()..].trim().to_string())
}

/// Match `segment` against the echo of `command`, returning the response
pub fn match_echo(
    segment: &str,
    command: &str,
    prompt: &str,
    columns: usize,
    echo_simulated: bool,
) -> Option<String> {
    let expected = expected_echo(command, prompt, columns, echo_simulated);
    match echo_matcher(&expected) {
        Ok(matcher) => strip_echo(segment, &matcher),
        Err(e) => {
            warn!("Cannot build echo matcher for '{}': {}", command, e);
            None
        }
    }
}
