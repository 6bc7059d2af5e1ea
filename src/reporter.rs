//! Operator-facing narration of configuration changes.
//!
//! Sections never print. They report through a [`Reporter`] passed in by the
//! caller, so a CLI can colorize, a pipeline can log, and tests can record.

use owo_colors::OwoColorize;
use std::cell::RefCell;

/// Receives notifications about configuration changes
pub trait Reporter {
    /// A field now holds `value` (reported after every `update`)
    fn field_updated(&self, section: &str, field: &str, value: &str);

    /// Something was adjusted that the operator should know about
    fn warning(&self, message: &str);
}

/// Discards every report
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn field_updated(&self, _section: &str, _field: &str, _value: &str) {}

    fn warning(&self, _message: &str) {}
}

// =============================================================================
// Console
// =============================================================================

/// Check if stderr supports colors (TTY detection)
fn use_colors() -> bool {
    supports_color::on(supports_color::Stream::Stderr).is_some()
}

/// Writes reports to stderr, colorized when stderr is a TTY
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn field_updated(&self, section: &str, field: &str, value: &str) {
        if use_colors() {
            eprintln!(
                "{}.{} will be {}",
                section.cyan().bold(),
                field.yellow(),
                value.green()
            );
        } else {
            eprintln!("{}.{} will be {}", section, field, value);
        }
    }

    fn warning(&self, message: &str) {
        if use_colors() {
            eprintln!("{}: {}", "warning".yellow().bold(), message);
        } else {
            eprintln!("warning: {}", message);
        }
    }
}

// =============================================================================
// Tracing
// =============================================================================

/// Forwards reports as `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn field_updated(&self, section: &str, field: &str, value: &str) {
        tracing::info!(section, field, value, "configuration field updated");
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

// =============================================================================
// Recording
// =============================================================================

/// One captured report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    FieldUpdated {
        section: String,
        field: String,
        value: String,
    },
    Warning(String),
}

/// Keeps every report in memory, in order
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: RefCell<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.borrow().clone()
    }

    /// Reported value of `section.field`, most recent first
    pub fn value_of(&self, section: &str, field: &str) -> Option<String> {
        self.reports.borrow().iter().rev().find_map(|r| match r {
            Report::FieldUpdated {
                section: s,
                field: f,
                value,
            } if s == section && f == field => Some(value.clone()),
            _ => None,
        })
    }

    pub fn warnings(&self) -> Vec<String> {
        self.reports
            .borrow()
            .iter()
            .filter_map(|r| match r {
                Report::Warning(w) => Some(w.clone()),
                Report::FieldUpdated { .. } => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn field_updated(&self, section: &str, field: &str, value: &str) {
        self.reports.borrow_mut().push(Report::FieldUpdated {
            section: section.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
    }

    fn warning(&self, message: &str) {
        self.reports
            .borrow_mut()
            .push(Report::Warning(message.to_string()));
    }
}
