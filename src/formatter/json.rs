use std::io::Write;

use serde::Serialize;

use crate::fix::{FileReport, FixReport};
use crate::formatter::Formatter;

pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonOutput<'a> {
    metadata: Metadata,
    files: &'a [FileReport],
}

#[derive(Serialize)]
struct Metadata {
    files_inspected: usize,
    fixed_count: usize,
    unchanged_count: usize,
    stuck_count: usize,
    failed_count: usize,
}

impl Formatter for JsonFormatter {
    fn format_to(&self, report: &FixReport, out: &mut dyn Write) {
        let output = JsonOutput {
            metadata: Metadata {
                files_inspected: report.files.len(),
                fixed_count: report.fixed_count(),
                unchanged_count: report.unchanged_count(),
                stuck_count: report.stuck_count(),
                failed_count: report.failed_count(),
            },
            files: &report.files,
        };
        if let Ok(json) = serde_json::to_string_pretty(&output) {
            let _ = writeln!(out, "{json}");
        }
    }
}
