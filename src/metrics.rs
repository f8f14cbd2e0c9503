//! Analysis-time metric collectors
//!
//! Collectors look at each tree once and contribute named counters. Values
//! are kept per file in a [`MetricTable`] owned by the result aggregator, so
//! nothing is stashed on the trees themselves.

use crate::tree::{NodeKind, SyntaxTree};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Contributes named counters for one file
pub trait MetricCollector: Send + Sync {
    fn id(&self) -> &str;

    fn collect(&self, tree: &SyntaxTree) -> Vec<(String, i64)>;
}

/// Counts analyzed files (`files`)
pub struct FileCountCollector;

impl MetricCollector for FileCountCollector {
    fn id(&self) -> &str {
        "files"
    }

    fn collect(&self, _tree: &SyntaxTree) -> Vec<(String, i64)> {
        vec![("files".to_string(), 1)]
    }
}

/// Counts lines covered by each file (`loc`)
pub struct LineCountCollector;

impl MetricCollector for LineCountCollector {
    fn id(&self) -> &str {
        "loc"
    }

    fn collect(&self, tree: &SyntaxTree) -> Vec<(String, i64)> {
        vec![("loc".to_string(), tree.line_count() as i64)]
    }
}

/// Counts classes, functions and properties
pub struct DeclarationCountCollector;

impl MetricCollector for DeclarationCountCollector {
    fn id(&self) -> &str {
        "declarations"
    }

    fn collect(&self, tree: &SyntaxTree) -> Vec<(String, i64)> {
        let (mut classes, mut functions, mut properties) = (0, 0, 0);
        for id in tree.walk() {
            match tree.node(id).kind {
                NodeKind::Class | NodeKind::Object => classes += 1,
                NodeKind::Function => functions += 1,
                NodeKind::Property => properties += 1,
                _ => {}
            }
        }
        vec![
            ("classes".to_string(), classes),
            ("functions".to_string(), functions),
            ("properties".to_string(), properties),
        ]
    }
}

/// The collectors every run uses unless configured otherwise
pub fn default_collectors() -> Vec<Box<dyn MetricCollector>> {
    vec![
        Box::new(FileCountCollector),
        Box::new(LineCountCollector),
        Box::new(DeclarationCountCollector),
    ]
}

/// Metric values keyed by (file, metric name)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricTable {
    values: BTreeMap<(PathBuf, String), i64>,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the metric of `file`
    pub fn add(&mut self, file: &Path, metric: &str, value: i64) {
        *self
            .values
            .entry((file.to_path_buf(), metric.to_string()))
            .or_insert(0) += value;
    }

    pub fn get(&self, file: &Path, metric: &str) -> Option<i64> {
        self.values
            .get(&(file.to_path_buf(), metric.to_string()))
            .copied()
    }

    pub fn merge(&mut self, other: MetricTable) {
        for ((file, metric), value) in other.values {
            *self.values.entry((file, metric)).or_insert(0) += value;
        }
    }

    /// Sum of every metric across files
    pub fn totals(&self) -> BTreeMap<String, i64> {
        let mut totals = BTreeMap::new();
        for ((_, metric), value) in &self.values {
            *totals.entry(metric.clone()).or_insert(0) += value;
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
