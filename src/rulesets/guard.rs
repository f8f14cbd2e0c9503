//! Rules guarding the analysis itself
//!
//! Rules in this set belong to the guard category and cannot be suppressed.

use crate::config::{Config, ConfigError};
use crate::diagnostic::{Finding, Severity};
use crate::plugin::RuleSetProvider;
use crate::rule::{Rule, RuleCategory, RuleContext, RuleError, RuleMeta, RuleOption};
use crate::suppression::{MARKER_ANNOTATIONS, MARKER_PREFIXES};
use serde_yaml::Value;

pub struct GuardProvider {
    rules: Vec<RuleMeta>,
}

impl Default for GuardProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardProvider {
    pub const ID: &'static str = "guard";

    pub fn new() -> Self {
        Self {
            rules: vec![RuleMeta::new(
                "ForbiddenSuppress",
                "Reports suppression markers naming rules that must not be suppressed",
            )
            .inactive_by_default()
            .with_category(RuleCategory::Guard)
            .with_severity(Severity::Error)
            .since("0.1.0")
            .with_option(RuleOption::new(
                "rules",
                Value::Sequence(Vec::new()),
                "Rule ids that may not be suppressed",
            ))],
        }
    }
}

impl RuleSetProvider for GuardProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "Rules that police suppressions"
    }

    fn rules(&self) -> &[RuleMeta] {
        &self.rules
    }

    fn create_rule(&self, rule_id: &str, config: &Config) -> Result<Box<dyn Rule>, ConfigError> {
        match rule_id {
            "ForbiddenSuppress" => Ok(Box::new(ForbiddenSuppress {
                rules: config.value_or_default("rules", Vec::new())?,
            })),
            _ => Err(ConfigError::UnknownRule {
                rule_set: Self::ID.to_string(),
                rule: rule_id.to_string(),
            }),
        }
    }
}

/// Reports `@Suppress` markers naming one of the configured rules
pub struct ForbiddenSuppress {
    rules: Vec<String>,
}

impl ForbiddenSuppress {
    /// Configured rule named by a marker argument, if any
    fn forbidden<'a>(&'a self, argument: &str) -> Option<&'a str> {
        let argument = argument.trim();
        let bare = MARKER_PREFIXES
            .iter()
            .find_map(|p| argument.strip_prefix(p))
            .unwrap_or(argument);
        // `ruleSet:Rule` and `ruleSet.Rule` name the rule after the separator
        let rule = bare.rsplit([':', '.']).next().unwrap_or(bare);
        self.rules.iter().map(String::as_str).find(|r| *r == rule)
    }
}

impl Rule for ForbiddenSuppress {
    fn visit(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        if self.rules.is_empty() {
            return Ok(Vec::new());
        }

        let mut findings = Vec::new();
        for id in ctx.tree.walk() {
            let node = ctx.tree.node(id);
            let mut named: Vec<&str> = Vec::new();
            let forbidden = node
                .annotations
                .iter()
                .filter(|a| MARKER_ANNOTATIONS.contains(&a.name.as_str()))
                .flat_map(|a| a.args.iter())
                .filter_map(|arg| self.forbidden(arg));
            // First mention wins, whatever the spelling
            for rule in forbidden {
                if !named.contains(&rule) {
                    named.push(rule);
                }
            }

            let message = match named.as_slice() {
                [] => continue,
                [rule] => format!("Cannot @Suppress rule \"{}\" due to the current configuration.", rule),
                rules => format!(
                    "Cannot @Suppress rules {} due to the current configuration.",
                    rules
                        .iter()
                        .map(|r| format!("\"{}\"", r))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            };
            findings.push(ctx.finding(id, &message));
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::instantiate;
    use crate::tree::{Annotation, NodeKind, Span, TreeBuilder};
    use pretty_assertions::assert_eq;

    fn run(yaml: &str) -> Vec<String> {
        let mut b = TreeBuilder::new("A.kt", Span::lines(1, 20));
        let one = b.add(b.root(), NodeKind::Function, Some("one"), Span::lines(1, 5));
        let two = b.add(b.root(), NodeKind::Function, Some("two"), Span::lines(6, 9));
        let three = b.add(b.root(), NodeKind::Function, Some("three"), Span::lines(10, 12));
        b.annotate(one, Annotation::new("Suppress", &["LongMethod"]));
        b.annotate(two, Annotation::new("SuppressWarnings", &["frost:complexity:LongMethod", "MagicNumber"]));
        b.annotate(three, Annotation::new("Suppress", &["Unrelated"]));
        run_on(&b.build(), yaml)
    }

    fn run_on(tree: &crate::tree::SyntaxTree, yaml: &str) -> Vec<String> {
        let config = Config::from_yaml_str(yaml).unwrap();
        let set = instantiate(&GuardProvider::new(), &config, false).unwrap();
        set.active_rules()
            .flat_map(|r| r.visit(tree).unwrap())
            .map(|f| format!("{}: {}", f.entity.name, f.message))
            .collect()
    }

    #[test]
    fn test_inactive_by_default() {
        assert!(run("{}").is_empty());
    }

    #[test]
    fn test_reports_forbidden_markers() {
        let yaml = "guard:\n  ForbiddenSuppress:\n    active: true\n    rules: [LongMethod, MagicNumber]\n";
        assert_eq!(
            run(yaml),
            vec![
                "one: Cannot @Suppress rule \"LongMethod\" due to the current configuration.",
                "two: Cannot @Suppress rules \"LongMethod\", \"MagicNumber\" due to the current configuration.",
            ]
        );
    }

    #[test]
    fn test_repeated_rule_reported_once() {
        let mut b = TreeBuilder::new("B.kt", Span::lines(1, 10));
        let f = b.add(b.root(), NodeKind::Function, Some("f"), Span::lines(1, 5));
        b.annotate(f, Annotation::new("Suppress", &["LongMethod", "MagicNumber", "frost:LongMethod"]));
        b.annotate(f, Annotation::new("SuppressWarnings", &["complexity.MagicNumber"]));

        let yaml = "guard:\n  ForbiddenSuppress:\n    active: true\n    rules: [LongMethod, MagicNumber]\n";
        assert_eq!(
            run_on(&b.build(), yaml),
            vec!["f: Cannot @Suppress rules \"LongMethod\", \"MagicNumber\" due to the current configuration."]
        );
    }

    #[test]
    fn test_category_is_guard() {
        let set = instantiate(&GuardProvider::new(), &Config::empty(), false).unwrap();
        assert_eq!(set.rules[0].descriptor.category, RuleCategory::Guard);
        assert!(!set.rules[0].suppression.is_suppressible());
    }
}
