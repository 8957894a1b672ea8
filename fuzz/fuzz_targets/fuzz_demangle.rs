#![no_main]

use libfuzzer_sys::fuzz_target;
use trill_runtime::demangle;

fuzz_target!(|data: &[u8]| {
    // The demangler must reject malformed symbols by returning None; it must
    // never panic, whatever bytes a symbol table hands it.
    if let Ok(symbol) = std::str::from_utf8(data) {
        let _ = demangle(symbol);
    }
});
