#![no_main]

use libfuzzer_sys::fuzz_target;
use tracemake::classify::classify;
use tracemake::ingest::parse_trace;

fuzz_target!(|data: &[u8]| {
    // Arbitrary trace text must either group cleanly or return an error
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(commands) = parse_trace(input, "/src") {
            for command in &commands {
                let deps = classify(command);
                let _ = deps.prerequisite_paths();
                let _ = deps.target_paths();
            }
        }
    }
});
