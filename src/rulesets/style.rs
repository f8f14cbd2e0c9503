//! Naming conventions

use crate::config::{Config, ConfigError};
use crate::diagnostic::Finding;
use crate::plugin::RuleSetProvider;
use crate::rule::{Rule, RuleContext, RuleError, RuleMeta, RuleOption};
use crate::tree::NodeKind;
use regex::Regex;

const FUNCTION_PATTERN: &str = "[a-z][a-zA-Z0-9]*";
const CLASS_PATTERN: &str = "[A-Z][a-zA-Z0-9]*";

const FUNCTION_KINDS: &[NodeKind] = &[NodeKind::Function];
const CLASS_KINDS: &[NodeKind] = &[NodeKind::Class, NodeKind::Object];

pub struct StyleProvider {
    rules: Vec<RuleMeta>,
}

impl Default for StyleProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleProvider {
    pub const ID: &'static str = "style";

    pub fn new() -> Self {
        Self {
            rules: vec![
                RuleMeta::new("FunctionNaming", "Function names should follow the naming convention")
                    .since("0.1.0")
                    .with_option(RuleOption::new("pattern", FUNCTION_PATTERN, "Expected function name")),
                RuleMeta::new("ClassNaming", "Class names should follow the naming convention")
                    .since("0.1.0")
                    .with_option(RuleOption::new("pattern", CLASS_PATTERN, "Expected class name")),
            ],
        }
    }
}

impl RuleSetProvider for StyleProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "Rules that keep code consistent"
    }

    fn rules(&self) -> &[RuleMeta] {
        &self.rules
    }

    fn create_rule(&self, rule_id: &str, config: &Config) -> Result<Box<dyn Rule>, ConfigError> {
        let (kinds, label, default) = match rule_id {
            "FunctionNaming" => (FUNCTION_KINDS, "Function", FUNCTION_PATTERN),
            "ClassNaming" => (CLASS_KINDS, "Class", CLASS_PATTERN),
            _ => {
                return Err(ConfigError::UnknownRule {
                    rule_set: Self::ID.to_string(),
                    rule: rule_id.to_string(),
                })
            }
        };

        let pattern: String = config.value_or_default("pattern", default.to_string())?;
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            ConfigError::Invalid(format!(
                "Invalid pattern in '{}': {}",
                config.key_path("pattern"),
                e
            ))
        })?;

        Ok(Box::new(NamingRule {
            kinds,
            label,
            pattern,
            regex,
        }))
    }
}

/// Reports declarations whose name does not match a pattern
pub struct NamingRule {
    kinds: &'static [NodeKind],
    label: &'static str,
    pattern: String,
    regex: Regex,
}

impl Rule for NamingRule {
    fn visit(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        for id in ctx.tree.walk() {
            let node = ctx.tree.node(id);
            if !self.kinds.contains(&node.kind) {
                continue;
            }
            let Some(name) = node.name() else { continue };
            if !self.regex.is_match(name) {
                findings.push(ctx.finding(
                    id,
                    &format!("{} names should match the pattern: {}", self.label, self.pattern),
                ));
            }
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::instantiate;
    use crate::tree::{Span, TreeBuilder};

    #[test]
    fn test_naming() {
        let mut b = TreeBuilder::new("A.kt", Span::lines(1, 20));
        let good = b.add(b.root(), NodeKind::Class, Some("Good"), Span::lines(1, 5));
        b.add(good, NodeKind::Function, Some("doIt"), Span::lines(2, 3));
        b.add(good, NodeKind::Function, Some("Do_It"), Span::lines(4, 5));
        b.add(b.root(), NodeKind::Class, Some("bad_class"), Span::lines(6, 9));
        b.add(b.root(), NodeKind::Lambda, None, Span::lines(10, 11));
        let tree = b.build();

        let set = instantiate(&StyleProvider::new(), &Config::empty(), false).unwrap();
        let found: Vec<_> = set
            .rules
            .iter()
            .flat_map(|r| r.visit(&tree).unwrap())
            .map(|f| (f.rule_id, f.entity.name))
            .collect();

        assert_eq!(
            found,
            vec![
                ("FunctionNaming".to_string(), "Do_It".to_string()),
                ("ClassNaming".to_string(), "bad_class".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let config = Config::from_yaml_str("style:\n  ClassNaming:\n    pattern: '('\n").unwrap();
        let err = instantiate(&StyleProvider::new(), &config, false).unwrap_err();
        assert!(err.to_string().contains("style>ClassNaming>pattern"));
    }
}
