//! Reporters rendering an analysis result

mod json;
mod profiling;
mod text;

pub use json::JsonReporter;
pub use profiling::{ProfileSummaryReporter, ProfilingReporter};
pub use text::TextReporter;

use crate::result::AnalysisResult;

/// Renders a final result
pub trait Reporter: Send + Sync {
    fn id(&self) -> &str;

    /// Rendered report, or `None` when there is nothing to report
    fn render(&self, result: &AnalysisResult) -> Option<String>;
}
