#![no_main]

use hygiene::fix::terminator::{LineTerminator, split_lines};
use hygiene::fix::transform::transform;
use hygiene::fix::violation;
use libfuzzer_sys::fuzz_target;

// Input: first line is a diagnostic, the rest is the file.
fuzz_target!(|data: &[u8]| {
    let Some(split) = data.iter().position(|&b| b == b'\n') else {
        return;
    };
    let Ok(diagnostic) = std::str::from_utf8(&data[..split]) else {
        return;
    };
    let Some(record) = violation::parse(diagnostic) else {
        return;
    };
    let content = &data[split + 1..];
    let lines = split_lines(content);
    let terminator = LineTerminator::detect(content);

    if let Some(plan) = transform(&record, &lines, terminator) {
        let patched = plan.apply_to(content).expect("plan fits the lines it came from");
        assert_ne!(patched, content, "transform produced a no-op plan");
    }
});
