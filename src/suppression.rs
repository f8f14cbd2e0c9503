//! Suppression of findings
//!
//! Every rule instance owns a [`SuppressionResolver`] built from its
//! configuration. The resolver composes independent [`Suppressor`]s; a finding
//! is dropped as soon as one of them claims it. Suppressors never modify a
//! finding, they only answer yes or no.
//!
//! Marker annotations look like `@Suppress("LongMethod")` or
//! `@SuppressWarnings("frost:complexity")` and may sit on the declaration the
//! finding was reported against, on any enclosing declaration, or on the file.

use crate::config::{Config, ConfigError};
use crate::diagnostic::{Finding, Notification};
use crate::rule::RuleDescriptor;
use crate::tree::{NodeId, NodeKind, SyntaxTree};

/// Annotation names recognised as suppression markers
pub const MARKER_ANNOTATIONS: [&str; 2] = ["Suppress", "SuppressWarnings"];

/// Tool prefixes accepted in front of a marker argument
pub const MARKER_PREFIXES: [&str; 4] = ["frost:", "frost.", "Frost:", "Frost."];

/// Catch-all marker, matched ignoring case
const MARKER_ALL: &str = "all";

/// A predicate deciding whether a finding should be dropped
pub trait Suppressor: Send + Sync {
    /// Short name used in logs and notifications
    fn name(&self) -> &str;

    fn suppresses(&self, finding: &Finding, tree: &SyntaxTree) -> bool;
}

/// Names a marker argument may use to address one rule instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerTargets {
    names: Vec<String>,
}

impl MarkerTargets {
    pub fn for_rule(descriptor: &RuleDescriptor) -> Self {
        let set = &descriptor.rule_set_id;
        let mut names = vec![
            descriptor.rule_id.clone(),
            set.clone(),
            format!("{}.{}", set, descriptor.rule_id),
            format!("{}:{}", set, descriptor.rule_id),
        ];
        if descriptor.is_custom_instance() {
            names.push(descriptor.base_id.clone());
            names.push(format!("{}.{}", set, descriptor.base_id));
            names.push(format!("{}:{}", set, descriptor.base_id));
        }
        names.extend(descriptor.aliases.iter().cloned());
        Self { names }
    }

    /// Whether a single marker argument addresses these targets
    pub fn matched_by(&self, argument: &str) -> bool {
        let argument = argument.trim();
        let bare = MARKER_PREFIXES
            .iter()
            .find_map(|p| argument.strip_prefix(p))
            .unwrap_or(argument);

        bare.eq_ignore_ascii_case(MARKER_ALL) || self.names.iter().any(|n| n == bare)
    }

    /// Whether any marker annotation on `node` addresses these targets
    pub fn matched_on(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        tree.node(node)
            .annotations
            .iter()
            .filter(|a| MARKER_ANNOTATIONS.contains(&a.name.as_str()))
            .flat_map(|a| a.args.iter())
            .any(|arg| self.matched_by(arg))
    }
}

/// Node the finding was reported against, or the file root
fn anchor(finding: &Finding, tree: &SyntaxTree) -> NodeId {
    finding
        .entity
        .node
        .filter(|id| tree.get(*id).is_some())
        .unwrap_or_else(|| tree.root())
}

/// Drops findings covered by `Suppress` / `SuppressWarnings` markers
pub struct MarkerSuppressor {
    targets: MarkerTargets,
}

impl MarkerSuppressor {
    pub fn new(targets: MarkerTargets) -> Self {
        Self { targets }
    }
}

impl Suppressor for MarkerSuppressor {
    fn name(&self) -> &str {
        "suppression marker"
    }

    fn suppresses(&self, finding: &Finding, tree: &SyntaxTree) -> bool {
        tree.ancestors(anchor(finding, tree))
            .any(|id| self.targets.matched_on(tree, id))
    }
}

/// Drops findings inside declarations carrying one of the configured annotations
pub struct AnnotatedSuppressor {
    annotations: Vec<String>,
}

impl AnnotatedSuppressor {
    pub fn new(annotations: Vec<String>) -> Self {
        Self { annotations }
    }

    fn listed(&self, name: &str) -> bool {
        let simple = name.rsplit('.').next().unwrap_or(name);
        self.annotations.iter().any(|a| a == name || a == simple)
    }
}

impl Suppressor for AnnotatedSuppressor {
    fn name(&self) -> &str {
        "ignore_annotated"
    }

    fn suppresses(&self, finding: &Finding, tree: &SyntaxTree) -> bool {
        tree.ancestors(anchor(finding, tree))
            .filter(|id| tree.node(*id).kind.is_declaration())
            .any(|id| tree.node(id).annotations.iter().any(|a| self.listed(&a.name)))
    }
}

/// Drops findings inside functions whose name is in the ignore list
pub struct ScopeNameSuppressor {
    names: Vec<String>,
}

impl ScopeNameSuppressor {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

impl Suppressor for ScopeNameSuppressor {
    fn name(&self) -> &str {
        "ignore_function"
    }

    fn suppresses(&self, finding: &Finding, tree: &SyntaxTree) -> bool {
        tree.ancestors(anchor(finding, tree))
            .map(|id| tree.node(id))
            .filter(|n| n.kind == NodeKind::Function)
            .filter_map(|n| n.name())
            .any(|name| self.names.iter().any(|n| n == name))
    }
}

/// Drops findings the rule already marked with a suppression reason
pub struct AttachedReasonSuppressor;

impl Suppressor for AttachedReasonSuppressor {
    fn name(&self) -> &str {
        "attached reason"
    }

    fn suppresses(&self, finding: &Finding, _tree: &SyntaxTree) -> bool {
        !finding.suppress_reasons.is_empty()
    }
}

/// Outcome of resolving one finding
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Keep,
    /// Dropped by the named suppressor
    Suppressed(String),
    /// A suppressor matched but the rule cannot be suppressed
    Blocked(Notification),
}

/// Per-rule composition of suppressors
pub struct SuppressionResolver {
    rule: String,
    suppressible: bool,
    markers: MarkerTargets,
    suppressors: Vec<Box<dyn Suppressor>>,
}

impl SuppressionResolver {
    /// Build the resolver for a rule from its descriptor and config scope
    pub fn for_rule(descriptor: &RuleDescriptor, config: &Config) -> Result<Self, ConfigError> {
        let markers = MarkerTargets::for_rule(descriptor);
        let mut suppressors: Vec<Box<dyn Suppressor>> = vec![
            Box::new(AttachedReasonSuppressor),
            Box::new(MarkerSuppressor::new(markers.clone())),
        ];

        let annotated: Vec<String> = config.value_or_default("ignore_annotated", Vec::new())?;
        if !annotated.is_empty() {
            suppressors.push(Box::new(AnnotatedSuppressor::new(annotated)));
        }

        let functions: Vec<String> = config.value_or_default("ignore_function", Vec::new())?;
        if !functions.is_empty() {
            suppressors.push(Box::new(ScopeNameSuppressor::new(functions)));
        }

        Ok(Self {
            rule: descriptor.qualified_id(),
            suppressible: descriptor.category.is_suppressible(),
            markers,
            suppressors,
        })
    }

    /// Add a suppressor after the configured ones
    pub fn with_suppressor(mut self, suppressor: Box<dyn Suppressor>) -> Self {
        self.suppressors.push(suppressor);
        self
    }

    pub fn is_suppressible(&self) -> bool {
        self.suppressible
    }

    pub fn should_suppress(&self, finding: &Finding, tree: &SyntaxTree) -> bool {
        matches!(self.decide(finding, tree), Decision::Suppressed(_))
    }

    pub fn decide(&self, finding: &Finding, tree: &SyntaxTree) -> Decision {
        let Some(suppressor) = self.suppressors.iter().find(|s| s.suppresses(finding, tree)) else {
            return Decision::Keep;
        };

        if self.suppressible {
            return Decision::Suppressed(suppressor.name().to_string());
        }

        log::debug!(
            "Ignoring {} for unsuppressible rule {}",
            suppressor.name(),
            self.rule
        );
        Decision::Blocked(Notification::warning(format!(
            "Rule '{}' cannot be suppressed; ignoring {} at {}",
            self.rule,
            suppressor.name(),
            finding.location()
        )))
    }

    /// Whether a file-level marker switches the rule off for the whole file
    pub fn suppresses_file(&self, tree: &SyntaxTree) -> bool {
        self.suppressible && self.markers.matched_on(tree, tree.root())
    }
}
