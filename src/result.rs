//! Analysis result and its aggregation

use crate::diagnostic::{Finding, Notification, Severity};
use crate::metrics::MetricTable;
use crate::profiling::Profile;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate of one analysis run
///
/// A result is never changed in place: pipeline stages build a new value with
/// the `with_*` methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    findings: Vec<Finding>,
    notifications: Vec<Notification>,
    metrics: BTreeMap<String, i64>,
    #[serde(skip)]
    profile: Profile,
}

impl AnalysisResult {
    pub fn new(
        findings: Vec<Finding>,
        notifications: Vec<Notification>,
        metrics: BTreeMap<String, i64>,
        profile: Profile,
    ) -> Self {
        Self {
            findings,
            notifications,
            metrics,
            profile,
        }
    }

    /// Findings in reporting order
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn metrics(&self) -> &BTreeMap<String, i64> {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<i64> {
        self.metrics.get(name).copied()
    }

    /// Execution records; empty unless profiling was enabled
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Findings grouped by rule set id
    pub fn grouped_by_rule_set(&self) -> BTreeMap<&str, Vec<&Finding>> {
        let mut groups: BTreeMap<&str, Vec<&Finding>> = BTreeMap::new();
        for finding in &self.findings {
            groups.entry(finding.rule_set_id.as_str()).or_default().push(finding);
        }
        groups
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Number of findings at or above `threshold`
    pub fn count_at_least(&self, threshold: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity >= threshold).count()
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(Finding::is_error)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// A copy carrying `findings` instead, kept in reporting order
    pub fn with_findings(&self, mut findings: Vec<Finding>) -> Self {
        findings.sort_by(|a, b| a.report_order(b));
        Self {
            findings,
            ..self.clone()
        }
    }

    /// A copy with `notification` appended
    pub fn with_notification(&self, notification: Notification) -> Self {
        self.with_notifications(vec![notification])
    }

    pub fn with_notifications(&self, notifications: Vec<Notification>) -> Self {
        let mut result = self.clone();
        result.notifications.extend(notifications);
        result
    }

    /// A copy with metric `name` set to `value`
    pub fn with_metric(&self, name: &str, value: i64) -> Self {
        let mut result = self.clone();
        result.metrics.insert(name.to_string(), value);
        result
    }
}

/// Collects the pieces of a run and builds one [`AnalysisResult`]
#[derive(Debug, Default)]
pub struct ResultAggregator {
    findings: BTreeMap<String, Vec<Finding>>,
    notifications: Vec<Notification>,
    metrics: MetricTable,
    profile: Profile,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the surviving findings of one rule set
    pub fn add_findings(&mut self, rule_set: &str, findings: Vec<Finding>) {
        self.findings
            .entry(rule_set.to_string())
            .or_default()
            .extend(findings);
    }

    pub fn add_notification(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn add_notifications(&mut self, notifications: impl IntoIterator<Item = Notification>) {
        self.notifications.extend(notifications);
    }

    pub fn add_metrics(&mut self, metrics: MetricTable) {
        self.metrics.merge(metrics);
    }

    pub fn add_profile(&mut self, profile: Profile) {
        self.profile.merge(profile);
    }

    /// Per-file metric values collected so far
    pub fn metric_table(&self) -> &MetricTable {
        &self.metrics
    }

    /// Flatten findings into reporting order and fold metric totals
    pub fn build(self) -> AnalysisResult {
        let mut findings: Vec<Finding> = self.findings.into_values().flatten().collect();
        findings.sort_by(|a, b| a.report_order(b));

        AnalysisResult {
            findings,
            notifications: self.notifications,
            metrics: self.metrics.totals(),
            profile: self.profile,
        }
    }
}
