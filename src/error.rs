//! Top-level error and exit status

use crate::baseline::BaselineError;
use crate::config::ConfigError;
use crate::diagnostic::{Notification, Severity};
use crate::extension::ExtensionError;
use crate::plugin_manager::PluginLoadError;
use crate::result::AnalysisResult;
use crate::tree::TreeError;
use thiserror::Error;

/// Errors that abort a run
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Baseline(#[from] BaselineError),

    #[error(transparent)]
    Plugin(#[from] PluginLoadError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run failed due to an invalid configuration ({} problems)", .0.len())]
    InvalidConfig(Vec<Notification>),
}

impl Error {
    /// Exit status a caller should report for this error
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Error::Config(_) | Error::Plugin(_) | Error::InvalidConfig(_) => ExitStatus::InvalidConfig,
            Error::Baseline(BaselineError::Malformed { .. } | BaselineError::Structure { .. }) => {
                ExitStatus::InvalidConfig
            }
            Error::Extension(ExtensionError::Baseline(
                BaselineError::Malformed { .. } | BaselineError::Structure { .. },
            )) => ExitStatus::InvalidConfig,
            _ => ExitStatus::UnexpectedError,
        }
    }
}

/// Outcome of a run as seen by a command-line caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success = 0,
    UnexpectedError = 1,
    IssuesFound = 2,
    InvalidConfig = 3,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Status of a completed run
    ///
    /// The run fails when more than `max_issues` findings are at or above
    /// `fail_on`.
    pub fn of(result: &AnalysisResult, fail_on: Severity, max_issues: usize) -> Self {
        if result.count_at_least(fail_on) > max_issues {
            ExitStatus::IssuesFound
        } else {
            ExitStatus::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Entity, Finding, Location};
    use crate::tree::Span;
    use std::path::PathBuf;

    fn result_with(severities: &[Severity]) -> AnalysisResult {
        let findings = severities
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let entity = Entity {
                    name: "f".to_string(),
                    signature: format!("f{}()", i),
                    location: Location::new(PathBuf::from("a.kt"), Span::lines(i + 1, i + 1)),
                    node: None,
                };
                Finding::new("R", "s", *s, "m", entity)
            })
            .collect();
        AnalysisResult::default().with_findings(findings)
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::UnexpectedError.code(), 1);
        assert_eq!(ExitStatus::IssuesFound.code(), 2);
        assert_eq!(ExitStatus::InvalidConfig.code(), 3);
    }

    #[test]
    fn test_status_of_result() {
        let result = result_with(&[Severity::Warning, Severity::Warning, Severity::Error]);
        assert_eq!(ExitStatus::of(&result, Severity::Error, 0), ExitStatus::IssuesFound);
        assert_eq!(ExitStatus::of(&result, Severity::Error, 1), ExitStatus::Success);
        assert_eq!(ExitStatus::of(&result, Severity::Warning, 2), ExitStatus::IssuesFound);
        assert_eq!(ExitStatus::of(&result_with(&[Severity::Info]), Severity::Warning, 0), ExitStatus::Success);
    }

    #[test]
    fn test_error_status() {
        let invalid = Error::InvalidConfig(vec![Notification::error("bad")]);
        assert_eq!(invalid.exit_status(), ExitStatus::InvalidConfig);
        assert_eq!(invalid.to_string(), "Run failed due to an invalid configuration (1 problems)");

        let config = Error::from(ConfigError::UnknownRuleSet("nope".to_string()));
        assert_eq!(config.exit_status(), ExitStatus::InvalidConfig);

        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(io.exit_status(), ExitStatus::UnexpectedError);
    }
}
