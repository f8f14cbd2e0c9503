//! Size and complexity rules

use crate::config::{Config, ConfigError};
use crate::diagnostic::Finding;
use crate::plugin::RuleSetProvider;
use crate::rule::{Rule, RuleCategory, RuleContext, RuleError, RuleMeta, RuleOption};
use crate::tree::NodeKind;

pub struct ComplexityProvider {
    rules: Vec<RuleMeta>,
}

impl Default for ComplexityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplexityProvider {
    pub const ID: &'static str = "complexity";

    pub fn new() -> Self {
        Self {
            rules: vec![
                RuleMeta::new("LongMethod", "Functions should not span too many lines")
                    .with_category(RuleCategory::Complexity)
                    .since("0.1.0")
                    .with_option(RuleOption::new(
                        "threshold",
                        LongMethod::DEFAULT_THRESHOLD as u64,
                        "Maximum number of lines of a function",
                    )),
                RuleMeta::new("LargeClass", "Classes should not span too many lines")
                    .with_category(RuleCategory::Complexity)
                    .since("0.1.0")
                    .with_option(RuleOption::new(
                        "threshold",
                        LargeClass::DEFAULT_THRESHOLD as u64,
                        "Maximum number of lines of a class",
                    )),
                RuleMeta::new("LongParameterList", "Functions should not take too many parameters")
                    .with_category(RuleCategory::Complexity)
                    .since("0.1.0")
                    .with_option(RuleOption::new(
                        "function_threshold",
                        LongParameterList::DEFAULT_THRESHOLD as u64,
                        "Maximum number of parameters of a function",
                    )),
            ],
        }
    }
}

impl RuleSetProvider for ComplexityProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "Rules that report complex code"
    }

    fn rules(&self) -> &[RuleMeta] {
        &self.rules
    }

    fn create_rule(&self, rule_id: &str, config: &Config) -> Result<Box<dyn Rule>, ConfigError> {
        match rule_id {
            "LongMethod" => Ok(Box::new(LongMethod {
                threshold: config.value_or_default("threshold", LongMethod::DEFAULT_THRESHOLD)?,
            })),
            "LargeClass" => Ok(Box::new(LargeClass {
                threshold: config.value_or_default("threshold", LargeClass::DEFAULT_THRESHOLD)?,
            })),
            "LongParameterList" => Ok(Box::new(LongParameterList {
                threshold: config.value_or_default("function_threshold", LongParameterList::DEFAULT_THRESHOLD)?,
            })),
            _ => Err(ConfigError::UnknownRule {
                rule_set: Self::ID.to_string(),
                rule: rule_id.to_string(),
            }),
        }
    }
}

/// Functions longer than `threshold` lines
pub struct LongMethod {
    threshold: usize,
}

impl LongMethod {
    pub const DEFAULT_THRESHOLD: usize = 60;
}

impl Rule for LongMethod {
    fn visit(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(ctx
            .tree
            .walk()
            .filter_map(|id| {
                let node = ctx.tree.node(id);
                let lines = node.span.line_count();
                (node.kind == NodeKind::Function && lines > self.threshold).then(|| {
                    ctx.finding(
                        id,
                        &format!(
                            "The function {} is too long ({}). The maximum length is {}.",
                            node.name().unwrap_or("<anonymous>"),
                            lines,
                            self.threshold
                        ),
                    )
                })
            })
            .collect())
    }
}

/// Classes and objects longer than `threshold` lines
pub struct LargeClass {
    threshold: usize,
}

impl LargeClass {
    pub const DEFAULT_THRESHOLD: usize = 600;
}

impl Rule for LargeClass {
    fn visit(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        Ok(ctx
            .tree
            .walk()
            .filter_map(|id| {
                let node = ctx.tree.node(id);
                let lines = node.span.line_count();
                let is_class = matches!(node.kind, NodeKind::Class | NodeKind::Object);
                (is_class && lines > self.threshold).then(|| {
                    ctx.finding(
                        id,
                        &format!(
                            "Class {} is too large ({} lines). The maximum size is {}.",
                            node.name().unwrap_or("<anonymous>"),
                            lines,
                            self.threshold
                        ),
                    )
                })
            })
            .collect())
    }
}

/// Functions declaring more than `threshold` parameters
pub struct LongParameterList {
    threshold: usize,
}

impl LongParameterList {
    pub const DEFAULT_THRESHOLD: usize = 6;
}

impl Rule for LongParameterList {
    fn visit(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let tree = ctx.tree;
        Ok(tree
            .walk()
            .filter(|id| tree.node(*id).kind == NodeKind::Function)
            .filter_map(|id| {
                let count = tree
                    .node(id)
                    .children()
                    .iter()
                    .filter(|c| tree.node(**c).kind == NodeKind::Parameter)
                    .count();
                (count > self.threshold).then(|| {
                    ctx.finding(
                        id,
                        &format!(
                            "The function {} has too many parameters ({}). The maximum is {}.",
                            tree.node(id).name().unwrap_or("<anonymous>"),
                            count,
                            self.threshold
                        ),
                    )
                })
            })
            .collect())
    }
}
