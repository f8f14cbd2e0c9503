//! Profiling reports

use super::Reporter;
use crate::result::AnalysisResult;

/// CSV export of every (rule, file) execution
#[derive(Default)]
pub struct ProfilingReporter;

impl Reporter for ProfilingReporter {
    fn id(&self) -> &str {
        "profiling"
    }

    fn render(&self, result: &AnalysisResult) -> Option<String> {
        let profile = result.profile();
        (!profile.is_empty()).then(|| profile.to_csv())
    }
}

/// Table of the most expensive rules
pub struct ProfileSummaryReporter {
    top: usize,
}

impl Default for ProfileSummaryReporter {
    fn default() -> Self {
        Self { top: 10 }
    }
}

impl ProfileSummaryReporter {
    pub fn new(top: usize) -> Self {
        Self { top }
    }
}

impl Reporter for ProfileSummaryReporter {
    fn id(&self) -> &str {
        "profile-summary"
    }

    fn render(&self, result: &AnalysisResult) -> Option<String> {
        let profile = result.profile();
        (!profile.is_empty()).then(|| profile.format_report(self.top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiling::{ExecutionRecord, Profile};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn profiled() -> AnalysisResult {
        let mut profile = Profile::new();
        for (rule, micros) in [("A", 10), ("B", 30), ("C", 20)] {
            profile.record(ExecutionRecord {
                rule_set: "s".to_string(),
                rule: rule.to_string(),
                file: PathBuf::from("a.kt"),
                duration: Duration::from_micros(micros),
                findings: 0,
            });
        }
        AnalysisResult::new(Vec::new(), Vec::new(), BTreeMap::new(), profile)
    }

    #[test]
    fn test_nothing_without_profile() {
        assert!(ProfilingReporter.render(&AnalysisResult::default()).is_none());
        assert!(ProfileSummaryReporter::default().render(&AnalysisResult::default()).is_none());
    }

    #[test]
    fn test_csv() {
        let csv = ProfilingReporter.render(&profiled()).unwrap();
        assert_eq!(csv.lines().count(), 4);
        assert!(csv.starts_with("RuleSet,Rule,File,Duration(ms),Findings\n"));
    }

    #[test]
    fn test_summary_top_n() {
        let report = ProfileSummaryReporter::new(2).render(&profiled()).unwrap();
        assert!(report.contains("s:B"));
        assert!(report.contains("s:C"));
        assert!(!report.contains("s:A"));
    }
}
