//! JSON report

use super::Reporter;
use crate::diagnostic::Severity;
use crate::result::AnalysisResult;
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON reporter for machine-readable output
#[derive(Default)]
pub struct JsonReporter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    findings: Vec<JsonFinding<'a>>,
    notifications: Vec<JsonNotification<'a>>,
    metrics: &'a BTreeMap<String, i64>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonFinding<'a> {
    rule_set: &'a str,
    rule_id: &'a str,
    severity: Severity,
    message: &'a str,
    file: String,
    line: usize,
    column: usize,
    end_line: usize,
    end_column: usize,
    entity: &'a str,
    signature: &'a str,
    baseline_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    references: Vec<String>,
}

#[derive(Serialize)]
struct JsonNotification<'a> {
    level: String,
    message: &'a str,
}

#[derive(Serialize)]
struct JsonSummary {
    findings: usize,
    errors: usize,
    warnings: usize,
    infos: usize,
}

impl Reporter for JsonReporter {
    fn id(&self) -> &str {
        "json"
    }

    fn render(&self, result: &AnalysisResult) -> Option<String> {
        let findings = result
            .findings()
            .iter()
            .map(|f| {
                let span = &f.location().span;
                JsonFinding {
                    rule_set: &f.rule_set_id,
                    rule_id: &f.rule_id,
                    severity: f.severity,
                    message: &f.message,
                    file: f.location().path.display().to_string(),
                    line: span.start_line,
                    column: span.start_column,
                    end_line: span.end_line,
                    end_column: span.end_column,
                    entity: &f.entity.name,
                    signature: &f.entity.signature,
                    baseline_id: f.baseline_id(),
                    references: f.references.iter().map(|r| r.location.to_string()).collect(),
                }
            })
            .collect();

        let notifications = result
            .notifications()
            .iter()
            .map(|n| JsonNotification {
                level: n.level.to_string(),
                message: &n.message,
            })
            .collect();

        let output = JsonOutput {
            findings,
            notifications,
            metrics: result.metrics(),
            summary: JsonSummary {
                findings: result.findings().len(),
                errors: result.count(Severity::Error),
                warnings: result.count(Severity::Warning),
                infos: result.count(Severity::Info),
            },
        };

        let rendered = if self.pretty {
            serde_json::to_string_pretty(&output)
        } else {
            serde_json::to_string(&output)
        };

        match rendered {
            Ok(json) => Some(json),
            Err(e) => {
                log::error!("Failed to serialize JSON report: {}", e);
                None
            }
        }
    }
}
