pub mod json;
pub mod text;

use std::io::Write;

use crate::fix::FixReport;

pub trait Formatter {
    fn format_to(&self, report: &FixReport, out: &mut dyn Write);

    fn print(&self, report: &FixReport) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.format_to(report, &mut lock);
    }
}

pub fn create_formatter(format: &str) -> Box<dyn Formatter> {
    match format {
        "json" => Box::new(json::JsonFormatter),
        // "text" and any unknown value
        _ => Box::new(text::TextFormatter),
    }
}
