//! Extension pipeline applied to the aggregated result
//!
//! Extensions see the raw result, may rewrite it, and finally observe the
//! result every transform produced. They run in ascending priority; equal
//! priorities keep registration order. A failing extension aborts the run.

use crate::baseline::{Baseline, BaselineError, WriteOutcome};
use crate::diagnostic::Notification;
use crate::result::AnalysisResult;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Error raised by an extension
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Extension '{extension}' failed: {message}")]
    Failed { extension: String, message: String },

    #[error("Baseline error: {0}")]
    Baseline(#[from] BaselineError),
}

/// A stage of the extension pipeline
pub trait Extension: Send + Sync {
    fn id(&self) -> &str;

    /// Lower priorities run first
    fn priority(&self) -> i32 {
        0
    }

    /// Observe the result before any transform
    fn on_raw_result(&self, _result: &AnalysisResult) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Produce the result handed to the next stage
    fn transform(&self, result: AnalysisResult) -> Result<AnalysisResult, ExtensionError> {
        Ok(result)
    }

    /// Observe the result after every transform
    fn on_final_result(&self, _result: &AnalysisResult) {}
}

/// Ordered chain of extensions
#[derive(Default)]
pub struct ExtensionPipeline {
    extensions: Vec<Box<dyn Extension>>,
}

impl ExtensionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extension: Box<dyn Extension>) {
        log::debug!(
            "Registered extension '{}' (priority {})",
            extension.id(),
            extension.priority()
        );
        self.extensions.push(extension);
        // Stable: ties keep registration order
        self.extensions.sort_by_key(|e| e.priority());
    }

    pub fn with_extension(mut self, extension: Box<dyn Extension>) -> Self {
        self.register(extension);
        self
    }

    /// Extension ids in execution order
    pub fn ids(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Run every stage over `result`
    pub fn run(&self, result: AnalysisResult) -> Result<AnalysisResult, ExtensionError> {
        for extension in &self.extensions {
            extension.on_raw_result(&result)?;
        }

        let mut current = result;
        for extension in &self.extensions {
            log::debug!("Applying extension '{}'", extension.id());
            current = extension.transform(current)?;
        }

        for extension in &self.extensions {
            extension.on_final_result(&current);
        }

        Ok(current)
    }
}

/// Filters findings through a baseline file, optionally (re)writing it first
pub struct BaselineExtension {
    path: PathBuf,
    create: bool,
    baseline: OnceLock<Baseline>,
}

impl BaselineExtension {
    pub const ID: &'static str = "baseline";

    /// Filter by the baseline at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create: false,
            baseline: OnceLock::new(),
        }
    }

    /// Write the baseline from the raw findings before filtering
    pub fn creating(mut self) -> Self {
        self.create = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn baseline(&self) -> Result<&Baseline, BaselineError> {
        if let Some(baseline) = self.baseline.get() {
            return Ok(baseline);
        }
        let loaded = Baseline::load(&self.path)?;
        Ok(self.baseline.get_or_init(|| loaded))
    }
}

impl Extension for BaselineExtension {
    fn id(&self) -> &str {
        Self::ID
    }

    fn priority(&self) -> i32 {
        -100
    }

    fn on_raw_result(&self, result: &AnalysisResult) -> Result<(), ExtensionError> {
        if self.create {
            match Baseline::create_or_update(&self.path, result.findings())? {
                WriteOutcome::Written => log::info!("Baseline written to {}", self.path.display()),
                WriteOutcome::Unchanged => log::info!("Baseline {} unchanged", self.path.display()),
                WriteOutcome::Skipped => log::info!("No findings; baseline not created"),
            }
        }
        self.baseline()?;
        Ok(())
    }

    fn transform(&self, result: AnalysisResult) -> Result<AnalysisResult, ExtensionError> {
        let baseline = self.baseline()?;
        if baseline.is_empty() {
            return Ok(result);
        }
        let blocked: Vec<Notification> = baseline
            .blocked(result.findings())
            .into_iter()
            .map(|f| {
                Notification::warning(format!(
                    "Rule '{}:{}' cannot be suppressed; ignoring baseline at {}",
                    f.rule_set_id,
                    f.rule_id,
                    f.location()
                ))
            })
            .collect();
        let before = result.findings().len();
        let kept = baseline.filter(result.findings().to_vec());
        log::debug!("Baseline filtered {} of {} findings", before - kept.len(), before);
        Ok(result.with_findings(kept).with_notifications(blocked))
    }
}
