//! Rule contract, metadata and configured rule instances

use crate::config::{Config, ConfigError};
use crate::diagnostic::{Entity, Finding, Severity};
use crate::suppression::SuppressionResolver;
use crate::tree::{NodeId, SyntaxTree};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Failure raised by a rule while visiting a tree
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{0}")]
    Failed(String),

    #[error("Rule configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule panicked: {0}")]
    Panicked(String),
}

/// Rule category for grouping related rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Code that is definitely wrong
    Correctness,
    /// Code that is hard to follow
    Complexity,
    /// Idiomatic and consistent style rules
    #[default]
    Style,
    /// Rules that improve runtime performance
    Performance,
    /// Rules that police the analysis itself; never suppressible
    Guard,
}

impl RuleCategory {
    pub fn is_suppressible(self) -> bool {
        self != RuleCategory::Guard
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCategory::Correctness => write!(f, "correctness"),
            RuleCategory::Complexity => write!(f, "complexity"),
            RuleCategory::Style => write!(f, "style"),
            RuleCategory::Performance => write!(f, "performance"),
            RuleCategory::Guard => write!(f, "guard"),
        }
    }
}

impl std::str::FromStr for RuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correctness" => Ok(RuleCategory::Correctness),
            "complexity" => Ok(RuleCategory::Complexity),
            "style" => Ok(RuleCategory::Style),
            "perf" | "performance" => Ok(RuleCategory::Performance),
            "guard" => Ok(RuleCategory::Guard),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// A configurable option a rule reads from its scope
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOption {
    pub name: String,
    /// Default value; its shape is what validation expects
    pub default: Value,
    pub description: String,
}

impl RuleOption {
    pub fn new(name: &str, default: impl Into<Value>, description: &str) -> Self {
        Self {
            name: name.to_string(),
            default: default.into(),
            description: description.to_string(),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.default, Value::Sequence(_))
    }
}

/// Static description of a rule, as provided by its rule set
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMeta {
    pub id: String,
    pub description: String,
    pub active_by_default: bool,
    pub severity: Severity,
    pub category: RuleCategory,
    /// Version the rule was introduced in
    pub since: Option<String>,
    pub options: Vec<RuleOption>,
}

impl RuleMeta {
    pub fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            active_by_default: true,
            severity: Severity::Warning,
            category: RuleCategory::default(),
            since: None,
            options: Vec::new(),
        }
    }

    pub fn inactive_by_default(mut self) -> Self {
        self.active_by_default = false;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_category(mut self, category: RuleCategory) -> Self {
        self.category = category;
        self
    }

    pub fn since(mut self, version: &str) -> Self {
        self.since = Some(version.to_string());
        self
    }

    pub fn with_option(mut self, option: RuleOption) -> Self {
        self.options.push(option);
        self
    }
}

/// Where a rule's active flag came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Set in configuration
    Explicit(bool),
    /// Compiled-in default of the rule
    Default(bool),
    /// Forced on by `all_rules`
    Forced,
}

impl Activation {
    pub fn is_active(self) -> bool {
        match self {
            Activation::Explicit(active) | Activation::Default(active) => active,
            Activation::Forced => true,
        }
    }
}

/// Identity and resolved settings of one rule instance
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDescriptor {
    pub rule_set_id: String,
    /// Instance id; `RuleId/suffix` for custom instances
    pub rule_id: String,
    /// Id of the rule implementation
    pub base_id: String,
    pub activation: Activation,
    pub severity: Severity,
    pub category: RuleCategory,
    pub since: Option<String>,
    pub aliases: Vec<String>,
}

impl RuleDescriptor {
    pub fn is_active(&self) -> bool {
        self.activation.is_active()
    }

    pub fn is_custom_instance(&self) -> bool {
        self.rule_id != self.base_id
    }

    /// `ruleSet:rule` form used in messages
    pub fn qualified_id(&self) -> String {
        format!("{}:{}", self.rule_set_id, self.rule_id)
    }
}

/// Everything a rule sees while visiting one file
pub struct RuleContext<'a> {
    pub tree: &'a SyntaxTree,
    pub descriptor: &'a RuleDescriptor,
    /// The rule instance's own configuration scope
    pub config: &'a Config,
}

impl<'a> RuleContext<'a> {
    pub fn new(tree: &'a SyntaxTree, descriptor: &'a RuleDescriptor, config: &'a Config) -> Self {
        Self {
            tree,
            descriptor,
            config,
        }
    }

    /// Finding against `node` carrying this instance's identity and severity
    pub fn finding(&self, node: NodeId, message: &str) -> Finding {
        Finding::new(
            &self.descriptor.rule_id,
            &self.descriptor.rule_set_id,
            self.descriptor.severity,
            message,
            self.entity(node),
        )
    }

    pub fn entity(&self, node: NodeId) -> Entity {
        Entity::from_node(self.tree, node)
    }
}

/// A diagnostic rule
///
/// Implementations hold their options (read once at instantiation) and must
/// not keep per-file state: the same instance visits many files, possibly
/// from several threads.
pub trait Rule: Send + Sync {
    /// Visit one tree and return raw findings
    fn visit(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError>;
}

/// Include/exclude path globs of a rule or rule set
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    includes: Option<GlobSet>,
    excludes: Option<GlobSet>,
}

impl PathFilter {
    /// Read `includes` and `excludes` from a scope
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let includes: Option<Vec<String>> = config.value_or_none("includes")?;
        let excludes: Option<Vec<String>> = config.value_or_none("excludes")?;
        Ok(Self {
            includes: includes
                .map(|p| build_globset(&p, &config.key_path("includes")))
                .transpose()?,
            excludes: excludes
                .map(|p| build_globset(&p, &config.key_path("excludes")))
                .transpose()?,
        })
    }

    /// Included (or no includes given) and not excluded
    pub fn matches(&self, path: &Path) -> bool {
        let included = self.includes.as_ref().map_or(true, |set| set.is_match(path));
        let excluded = self.excludes.as_ref().is_some_and(|set| set.is_match(path));
        included && !excluded
    }
}

fn build_globset(patterns: &[String], key: &str) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ConfigError::Invalid(format!("Invalid glob '{}' in '{}': {}", pattern, key, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::Invalid(format!("Invalid globs in '{}': {}", key, e)))
}

/// A rule bound to its configuration, ready to run
pub struct RuleInstance {
    pub descriptor: RuleDescriptor,
    pub config: Config,
    pub suppression: SuppressionResolver,
    path_filter: PathFilter,
    rule: Box<dyn Rule>,
}

impl RuleInstance {
    pub fn new(descriptor: RuleDescriptor, config: Config, rule: Box<dyn Rule>) -> Result<Self, ConfigError> {
        let path_filter = PathFilter::from_config(&config)?;
        let suppression = SuppressionResolver::for_rule(&descriptor, &config)?;
        Ok(Self {
            descriptor,
            config,
            suppression,
            path_filter,
            rule,
        })
    }

    pub fn id(&self) -> &str {
        &self.descriptor.rule_id
    }

    pub fn is_active(&self) -> bool {
        self.descriptor.is_active()
    }

    /// Whether the instance's own path filter accepts the file
    pub fn accepts(&self, path: &Path) -> bool {
        self.path_filter.matches(path)
    }

    /// Visit `tree`, stamping this instance's identity and suppressibility on
    /// every finding
    pub fn visit(&self, tree: &SyntaxTree) -> Result<Vec<Finding>, RuleError> {
        let ctx = RuleContext::new(tree, &self.descriptor, &self.config);
        let findings = self.rule.visit(&ctx)?;
        Ok(findings
            .into_iter()
            .map(|mut f| {
                if f.rule_id != self.descriptor.rule_id {
                    f.rule_id = self.descriptor.rule_id.clone();
                }
                if f.rule_set_id != self.descriptor.rule_set_id {
                    f.rule_set_id = self.descriptor.rule_set_id.clone();
                }
                f.suppressible = self.suppression.is_suppressible();
                f
            })
            .collect())
    }
}

impl fmt::Debug for RuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleInstance")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// A provider bound to its configuration scope
#[derive(Debug)]
pub struct RuleSet {
    pub id: String,
    pub rules: Vec<RuleInstance>,
    path_filter: PathFilter,
}

impl RuleSet {
    pub fn new(id: &str, rules: Vec<RuleInstance>, path_filter: PathFilter) -> Self {
        Self {
            id: id.to_string(),
            rules,
            path_filter,
        }
    }

    pub fn active_rules(&self) -> impl Iterator<Item = &RuleInstance> {
        self.rules.iter().filter(|r| r.is_active())
    }

    /// Indices of the active rules whose rule set and own filters accept `path`
    pub fn rules_for(&self, path: &Path) -> Vec<usize> {
        if !self.path_filter.matches(path) {
            return Vec::new();
        }
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_active() && r.accepts(path))
            .map(|(i, _)| i)
            .collect()
    }
}
