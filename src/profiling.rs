//! Per rule and file execution timing

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Header of the profiling CSV export
pub const CSV_HEADER: &str = "RuleSet,Rule,File,Duration(ms),Findings";

/// One (rule, file) execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub rule_set: String,
    pub rule: String,
    pub file: PathBuf,
    pub duration: Duration,
    /// Findings reported before suppression
    pub findings: usize,
}

/// Totals of one rule across all files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleProfile {
    pub rule_set: String,
    pub rule: String,
    /// Total time spent on this rule
    pub total: Duration,
    /// Number of files the rule ran on
    pub files: usize,
    /// Number of findings reported
    pub findings: usize,
}

impl RuleProfile {
    /// Average time per file
    pub fn average(&self) -> Duration {
        if self.files > 0 {
            self.total / self.files as u32
        } else {
            Duration::ZERO
        }
    }
}

/// Execution records of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    records: Vec<ExecutionRecord>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: ExecutionRecord) {
        self.records.push(record);
    }

    /// Append records collected by another worker
    pub fn merge(&mut self, other: Profile) {
        self.records.extend(other.records);
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Per-rule totals sorted by total duration (descending)
    pub fn aggregate(&self) -> Vec<RuleProfile> {
        let mut by_rule: BTreeMap<(&str, &str), RuleProfile> = BTreeMap::new();
        for record in &self.records {
            let entry = by_rule
                .entry((record.rule_set.as_str(), record.rule.as_str()))
                .or_insert_with(|| RuleProfile {
                    rule_set: record.rule_set.clone(),
                    rule: record.rule.clone(),
                    ..RuleProfile::default()
                });
            entry.total += record.duration;
            entry.files += 1;
            entry.findings += record.findings;
        }

        let mut profiles: Vec<RuleProfile> = by_rule.into_values().collect();
        // Stable sort keeps (rule set, rule) order among equal totals
        profiles.sort_by(|a, b| b.total.cmp(&a.total));
        profiles
    }

    /// The `n` most expensive rules
    pub fn top(&self, n: usize) -> Vec<RuleProfile> {
        let mut profiles = self.aggregate();
        profiles.truncate(n);
        profiles
    }

    /// CSV export, one row per record sorted by rule set, rule and file
    pub fn to_csv(&self) -> String {
        let mut rows: Vec<&ExecutionRecord> = self.records.iter().collect();
        rows.sort_by(|a, b| {
            a.rule_set
                .cmp(&b.rule_set)
                .then_with(|| a.rule.cmp(&b.rule))
                .then_with(|| a.file.cmp(&b.file))
        });

        let mut output = String::from(CSV_HEADER);
        output.push('\n');
        for r in rows {
            output.push_str(&format!(
                "{},{},{},{:.3},{}\n",
                csv_field(&r.rule_set),
                csv_field(&r.rule),
                csv_field(&r.file.display().to_string()),
                r.duration.as_secs_f64() * 1000.0,
                r.findings
            ));
        }
        output
    }

    /// Format the `n` most expensive rules as a table
    pub fn format_report(&self, n: usize) -> String {
        let profiles = self.top(n);
        if profiles.is_empty() {
            return "No timing data available".to_string();
        }

        let mut output = String::new();
        output.push_str("Rule Timing Statistics:\n");
        output.push_str(&format!(
            "{:<40} {:>12} {:>12} {:>8} {:>10}\n",
            "Rule", "Total (ms)", "Avg (ms)", "Files", "Findings"
        ));
        output.push_str(&"-".repeat(86));
        output.push('\n');

        for p in profiles {
            output.push_str(&format!(
                "{:<40} {:>12.3} {:>12.3} {:>8} {:>10}\n",
                format!("{}:{}", p.rule_set, p.rule),
                p.total.as_secs_f64() * 1000.0,
                p.average().as_secs_f64() * 1000.0,
                p.files,
                p.findings
            ));
        }

        output
    }
}

/// Quote a CSV field when it contains a separator, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
