#![no_main]

use libfuzzer_sys::fuzz_target;
use neo_debugger::debug_info::SourceMap;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(map) = SourceMap::build(text) {
            for offset in map.opcodes.keys() {
                let _ = map.resolve(*offset);
            }
            assert!(map.line_starts.keys().all(|o| map.opcodes.contains_key(o)));
        }
    }
});
