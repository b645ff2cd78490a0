#![no_main]

use libfuzzer_sys::fuzz_target;

use stashit::sanitizer::sanitize;

fuzz_target!(|data: &[u8]| {
    // Convert raw bytes to string, handling invalid UTF-8 gracefully
    let html = String::from_utf8_lossy(data).to_string();

    // Sanitization must never panic regardless of input, and must be
    // idempotent: cleaning already-clean output changes nothing.
    let cleaned = sanitize(&html);
    assert_eq!(sanitize(&cleaned), cleaned);
});
