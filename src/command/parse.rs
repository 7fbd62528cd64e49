//! Inbound command recognition.
//!
//! Commands are plain text, matched exactly against a fixed literal set.
//! Unrecognized text is classified as `Unknown` rather than rejected —
//! the worker decides what to do with it, not the transport.

/// The recognized remote commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Run the pump for the configured watering interval.
    Water,
    /// Publish a system status snapshot.
    GetStatus,
    /// Publish the latest soil reading.
    GetReading,
    /// Start a firmware update (payload = firmware URL).
    OtaUpdate,
    /// Publish the update engine's state, progress, and statistics.
    OtaStatus,
    /// Cancel the in-flight firmware update.
    OtaCancel,
    /// Anything else.
    Unknown,
}

/// Payloads are capped at this many bytes; longer text is truncated at the
/// nearest character boundary.  Matches the locator field width of the wire
/// contract.
pub const MAX_PAYLOAD_BYTES: usize = 256;

/// Classify a command word.  Exact match only — no case folding, no
/// trimming.  `澆水` is the localized alias for `WATER`.
pub fn parse(raw: &str) -> CommandKind {
    match raw {
        "WATER" | "澆水" => CommandKind::Water,
        "GET_STATUS" => CommandKind::GetStatus,
        "GET_READING" => CommandKind::GetReading,
        "OTA_UPDATE" => CommandKind::OtaUpdate,
        "OTA_STATUS" => CommandKind::OtaStatus,
        "OTA_CANCEL" => CommandKind::OtaCancel,
        _ => CommandKind::Unknown,
    }
}

/// Split inbound text into the command word and its payload, e.g.
/// `"OTA_UPDATE http://host/app.bin"` → `("OTA_UPDATE", "http://host/app.bin")`.
pub fn split_command(raw: &str) -> (&str, &str) {
    match raw.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (raw, ""),
    }
}

/// Copy `raw` into an owned payload, truncated to [`MAX_PAYLOAD_BYTES`]
/// without splitting a character.
pub fn bounded_payload(raw: &str) -> String {
    if raw.len() <= MAX_PAYLOAD_BYTES {
        return raw.to_owned();
    }
    let mut end = MAX_PAYLOAD_BYTES;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    raw[..end].to_owned()
}
