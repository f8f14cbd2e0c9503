//! Human-readable console report

use super::Reporter;
use crate::diagnostic::{Finding, NotificationLevel, Severity};
use crate::result::AnalysisResult;
use colored::*;
use std::collections::BTreeMap;
use std::path::Path;

/// Text reporter with optional color support
pub struct TextReporter {
    /// Enable colored output
    pub colored: bool,

    /// Show the summary line
    pub show_stats: bool,

    /// Show metric totals
    pub show_metrics: bool,
}

impl Default for TextReporter {
    fn default() -> Self {
        Self {
            colored: true,
            show_stats: true,
            show_metrics: false,
        }
    }
}

impl TextReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    pub fn with_metrics(mut self) -> Self {
        self.show_metrics = true;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
            Severity::Info => s.blue(),
        }
    }

    fn level_str(&self, level: NotificationLevel) -> ColoredString {
        let s = format!("{}", level);
        if !self.colored {
            return s.normal();
        }
        match level {
            NotificationLevel::Error => s.red().bold(),
            NotificationLevel::Warning => s.yellow().bold(),
            NotificationLevel::Info => s.blue(),
        }
    }

    fn format_finding(&self, finding: &Finding) -> String {
        let rule = format!("[{}:{}]", finding.rule_set_id, finding.rule_id);
        format!(
            "  {}:{}  {}  {}  {}",
            finding.location().line(),
            finding.location().column(),
            self.severity_str(finding.severity),
            finding.message,
            if self.colored { rule.dimmed().to_string() } else { rule }
        )
    }

    fn count(&self, n: usize, singular: &str, plural: &str) -> String {
        format!("{} {}", n, if n == 1 { singular } else { plural })
    }
}

impl Reporter for TextReporter {
    fn id(&self) -> &str {
        "text"
    }

    fn render(&self, result: &AnalysisResult) -> Option<String> {
        if result.findings().is_empty() && result.notifications().is_empty() {
            return None;
        }

        let mut output = String::new();

        // Findings are already in report order; group by file keeping it
        let mut by_file: BTreeMap<&Path, Vec<&Finding>> = BTreeMap::new();
        for finding in result.findings() {
            by_file.entry(finding.location().path.as_path()).or_default().push(finding);
        }

        for (file, findings) in &by_file {
            if self.colored {
                output.push_str(&format!("{}\n", file.display().to_string().underline()));
            } else {
                output.push_str(&format!("{}\n", file.display()));
            }
            for finding in findings {
                output.push_str(&self.format_finding(finding));
                output.push('\n');
            }
            output.push('\n');
        }

        for notification in result.notifications() {
            output.push_str(&format!(
                "{}: {}\n",
                self.level_str(notification.level),
                notification.message
            ));
        }

        if self.show_metrics && !result.metrics().is_empty() {
            output.push_str("\nMetrics:\n");
            for (name, value) in result.metrics() {
                output.push_str(&format!("  {:<20} {:>10}\n", name, value));
            }
        }

        if self.show_stats {
            let mut counts = Vec::new();
            let errors = result.count(Severity::Error);
            let warnings = result.count(Severity::Warning);
            let infos = result.count(Severity::Info);
            if errors > 0 {
                let s = self.count(errors, "error", "errors");
                counts.push(if self.colored { s.red().to_string() } else { s });
            }
            if warnings > 0 {
                let s = self.count(warnings, "warning", "warnings");
                counts.push(if self.colored { s.yellow().to_string() } else { s });
            }
            if infos > 0 {
                counts.push(self.count(infos, "info", "infos"));
            }

            output.push_str(&format!(
                "\n{} in {}",
                self.count(result.findings().len(), "finding", "findings"),
                self.count(by_file.len(), "file", "files")
            ));
            if !counts.is_empty() {
                output.push_str(&format!(" ({})", counts.join(", ")));
            }
            output.push('\n');
        }

        Some(output)
    }
}
