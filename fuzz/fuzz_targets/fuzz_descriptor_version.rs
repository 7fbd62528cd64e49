//! Fuzz image descriptor extraction against arbitrary download chunks.

#![no_main]

use libfuzzer_sys::fuzz_target;
use soilwarden::ota::image::descriptor_version;

fuzz_target!(|data: &[u8]| {
    if let Some(version) = descriptor_version(data) {
        assert!(version.len() <= 32);
    }
});
