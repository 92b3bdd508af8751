#![no_main]

use libfuzzer_sys::fuzz_target;
use neo_debugger::debug_info::DebugInfo;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(info) = DebugInfo::from_json(text) {
            for method in &info.methods {
                assert!(method.range.start() <= method.range.end());
            }
        }
    }
});
