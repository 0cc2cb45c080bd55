#![no_main]

use libfuzzer_sys::fuzz_target;
use milli_h2::{Context, Side};

fuzz_target!(|data: &[u8]| {
    // Split the input into a few blocks and run them through one context,
    // closing the header block between inflate calls. Must never panic; a
    // malformed block poisons the context and later calls fail fast.
    let mut inflater = Context::inflater(Side::Server);
    for chunk in data.chunks(64) {
        let _ = inflater.inflate(chunk);
        inflater.end_headers();
    }

    // A fresh context fed the whole input at once.
    let mut inflater = Context::inflater(Side::Client);
    if inflater.inflate(data).is_ok() {
        inflater.end_headers();
        // Decoded state must stay internally consistent.
        assert!(inflater.table_room() <= milli_h2::hd::HD_MAX_BUFFER_SIZE);
    }
});
