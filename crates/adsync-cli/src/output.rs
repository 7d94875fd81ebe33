//! Rendering of sync reports, health checks and failures
//!
//! Human output goes to a terminal: a mark per outcome, report fields
//! aligned under it. JSON output emits one document per command on stdout;
//! progress lines are suppressed so the document can be piped into `jq`.
//! Errors and warnings always go to stderr.

use adsync_sync::engine::{CheckStatus, HealthCheck};

/// Width of the label column in report fields
const LABEL_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Human
        }
    }
}

/// Sink for everything a command prints
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    /// One `label: value` line of a sync report
    fn field(&self, label: &str, value: &str);
    /// One `validate` check
    fn check(&self, check: &HealthCheck);
    fn print_json(&self, value: &serde_json::Value);
}

/// Terminal output; `quiet` drops report fields and info lines
pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {}", message);
        }
    }
    fn field(&self, label: &str, value: &str) {
        if !self.quiet {
            println!("{}", field_line(label, value));
        }
    }
    fn check(&self, check: &HealthCheck) {
        let line = check_line(check);
        match check.status {
            CheckStatus::Ok | CheckStatus::Warning => println!("{line}"),
            CheckStatus::Missing | CheckStatus::Invalid => eprintln!("{line}"),
        }
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// Machine output; reports arrive whole through `print_json`
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn field(&self, _label: &str, _value: &str) {}
    fn check(&self, _check: &HealthCheck) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
    }
}

fn field_line(label: &str, value: &str) -> String {
    let label = format!("{label}:");
    format!("  {label:<LABEL_WIDTH$}{value}")
}

fn check_line(check: &HealthCheck) -> String {
    let mark = match check.status {
        CheckStatus::Ok => "\u{2713}",
        CheckStatus::Warning => "\u{26a0}",
        CheckStatus::Missing => "\u{2717} missing",
        CheckStatus::Invalid => "\u{2717} invalid",
    };
    format!("{mark} {}: {}", check.name, check.detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flag() {
        assert_eq!(OutputFormat::from_flag(true), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flag(false), OutputFormat::Human);
    }

    #[test]
    fn test_report_fields_align() {
        assert_eq!(field_line("Rows fetched", "18"), "  Rows fetched:       18");
        assert_eq!(
            field_line("Duplicates removed", "8"),
            "  Duplicates removed: 8"
        );
    }

    #[test]
    fn test_check_lines_mark_status() {
        let check = HealthCheck {
            name: "state",
            status: CheckStatus::Missing,
            detail: "state/acme.json not found".into(),
        };
        assert_eq!(
            check_line(&check),
            "\u{2717} missing state: state/acme.json not found"
        );

        let check = HealthCheck {
            name: "date_gaps",
            status: CheckStatus::Warning,
            detail: "1 gap(s): 2025-09-01..2025-09-03".into(),
        };
        assert!(check_line(&check).starts_with("\u{26a0} date_gaps:"));
    }
}
