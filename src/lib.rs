//! Frost - Rule-Driven Static Analysis Engine
//!
//! Runs pluggable rules over parsed source trees and produces a single
//! ordered result of findings, notifications and metrics. Findings can be
//! suppressed inline with `@Suppress` markers or through a baseline file of
//! accepted issues.
//!
//! # Architecture
//!
//! ```text
//! Config -> RuleRegistry -> Engine -> ResultAggregator -> ExtensionPipeline -> Reporter
//! ```
//!
//! The registry discovers built-in and plugin rule sets and binds them to the
//! layered configuration. The engine schedules every active rule on every file
//! it accepts, runs the units sequentially or in parallel, filters findings
//! through the suppression resolver and aggregates them deterministically.
//! Extensions (the baseline among them) transform the result before
//! reporters render it.
//!
//! # Declarative Rule Sets
//!
//! Rule sets can be declared in a YAML manifest placed in a plugins directory:
//!
//! ```yaml
//! rule_set:
//!   id: legacy
//!   description: "Rules for the legacy module"
//!
//! rules:
//!   - id: NoManagers
//!     message: "{kind} {name} should not be a manager"
//!     severity: warning
//!     target:
//!       kind: class
//!       name: "*Manager"
//! ```

pub mod baseline;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod extension;
pub mod metrics;
pub mod output;
pub mod plugin;
pub mod plugin_manager;
pub mod profiling;
pub mod registry;
pub mod result;
pub mod rule;
pub mod rulesets;
pub mod runner;
pub mod signature;
pub mod suppression;
pub mod tree;
pub mod validation;

// Re-export main types
pub use baseline::Baseline;
pub use config::{Config, EngineSettings};
pub use diagnostic::{Entity, Finding, Location, Notification, NotificationLevel, Severity};
pub use engine::{Engine, RunPhase};
pub use error::{Error, ExitStatus};
pub use extension::{BaselineExtension, Extension, ExtensionPipeline};
pub use output::Reporter;
pub use plugin::RuleSetProvider;
pub use plugin_manager::{DeclarativeRuleSet, PluginManifest};
pub use registry::{DiscoveryOptions, RuleRegistry, RuleRestriction};
pub use result::{AnalysisResult, ResultAggregator};
pub use rule::{Rule, RuleCategory, RuleContext, RuleError, RuleMeta, RuleSet};
pub use runner::{RunOptions, RunOutcome, Runner};
pub use suppression::SuppressionResolver;
pub use tree::{NodeKind, Span, SyntaxTree, TreeBuilder};
