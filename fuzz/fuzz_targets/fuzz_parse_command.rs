//! Fuzz the inbound command path: split, classify, bound the payload.
//! None of it may panic, whatever the transport delivers.

#![no_main]

use libfuzzer_sys::fuzz_target;
use soilwarden::command::{bounded_payload, parse, split_command, MAX_PAYLOAD_BYTES};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = core::str::from_utf8(data) {
        let (word, payload) = split_command(text);
        let _ = parse(word);
        let bounded = bounded_payload(payload);
        assert!(bounded.len() <= MAX_PAYLOAD_BYTES);
    }
});
