#![no_main]

use hygiene::diagnostic::Diagnostic;
use hygiene::fix::violation;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    let diagnostic = Diagnostic::parse(line);
    if let Some(diagnostic) = &diagnostic {
        let _ = diagnostic.to_string();
    }
    if violation::parse(line).is_some() {
        assert!(diagnostic.is_some());
    }
});
