//! Plugin manifests - rule sets declared in YAML/JSON files
//!
//! A manifest declares one rule set and a list of declarative rules that
//! report nodes by kind and name pattern:
//!
//! ```yaml
//! rule_set:
//!   id: legacy
//!   description: "Rules for the legacy module"
//!
//! rules:
//!   - id: NoManagerClasses
//!     message: "Class {name} looks like a manager"
//!     severity: warning
//!     target:
//!       kind: class
//!       name: "*Manager"
//!   - id: HugeLambda
//!     message: "Lambda spans {lines} lines"
//!     target:
//!       kind: lambda
//!     max_lines: 30
//! ```

use crate::config::{Config, ConfigError};
use crate::diagnostic::{Finding, Severity};
use crate::plugin::RuleSetProvider;
use crate::rule::{Rule, RuleContext, RuleError, RuleMeta, RuleOption};
use crate::tree::NodeKind;
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during plugin loading
#[derive(Debug, Error)]
pub enum PluginLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Invalid manifest: {0}")]
    Invalid(String),

    #[error("Rule set '{0}' is already registered")]
    DuplicateRuleSet(String),
}

/// Plugin manifest file structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginManifest {
    pub rule_set: RuleSetMetadata,

    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleSetMetadata {
    pub id: String,

    #[serde(default)]
    pub description: String,
}

/// Rule definition in manifest
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleDefinition {
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Message template; `{name}`, `{kind}` and `{lines}` are replaced
    pub message: String,

    #[serde(default = "default_severity")]
    pub severity: String,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub target: TargetDefinition,

    /// Only report nodes spanning more lines than this
    #[serde(default)]
    pub max_lines: Option<usize>,
}

fn default_severity() -> String {
    "warning".to_string()
}

fn default_active() -> bool {
    true
}

/// Which nodes a declarative rule reports
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TargetDefinition {
    /// Node kind (class, function, lambda, ...)
    #[serde(default)]
    pub kind: Option<String>,

    /// Name pattern with `*` and `?` wildcards
    #[serde(default)]
    pub name: Option<String>,
}

impl PluginManifest {
    /// Read a manifest, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self, PluginLoadError> {
        let content = std::fs::read_to_string(path)?;
        let parse_error = |message: String| PluginLoadError::Parse {
            file: path.display().to_string(),
            message,
        };

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string())),
            "json" => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
            _ => Err(PluginLoadError::Invalid(format!(
                "Unsupported manifest format: {}",
                ext
            ))),
        }
    }
}

/// Manifest files in `dir`, sorted by name
///
/// Files directly in the directory are manifests; sub-directories may hold a
/// `plugin.yaml`, `plugin.yml` or `plugin.json`.
pub fn manifest_paths(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(manifest) = ["plugin.yaml", "plugin.yml", "plugin.json"]
                .iter()
                .map(|name| path.join(name))
                .find(|p| p.exists())
            {
                paths.push(manifest);
            }
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if matches!(ext, "yaml" | "yml" | "json") {
            paths.push(path);
        }
    }
    paths.sort();
    paths
}

/// Compiled target of a declarative rule
#[derive(Debug, Clone)]
struct Target {
    kind: Option<NodeKind>,
    name: Option<GlobMatcher>,
}

impl Target {
    fn from_definition(rule: &str, def: &TargetDefinition) -> Result<Self, PluginLoadError> {
        let kind = def
            .kind
            .as_deref()
            .map(|k| {
                k.parse::<NodeKind>()
                    .map_err(|e| PluginLoadError::Invalid(format!("Rule '{}': {}", rule, e)))
            })
            .transpose()?;
        let name = def
            .name
            .as_deref()
            .map(|pattern| {
                Glob::new(pattern)
                    .map(|g| g.compile_matcher())
                    .map_err(|e| PluginLoadError::Invalid(format!("Rule '{}': invalid name pattern: {}", rule, e)))
            })
            .transpose()?;
        Ok(Self { kind, name })
    }
}

#[derive(Debug, Clone)]
struct DeclaredRule {
    message: String,
    target: Target,
    max_lines: Option<usize>,
}

/// A rule set loaded from a manifest
#[derive(Debug)]
pub struct DeclarativeRuleSet {
    id: String,
    description: String,
    source: PathBuf,
    metas: Vec<RuleMeta>,
    rules: Vec<DeclaredRule>,
}

impl DeclarativeRuleSet {
    pub fn load(path: &Path) -> Result<Self, PluginLoadError> {
        Self::from_manifest(PluginManifest::load(path)?, path)
    }

    pub fn from_manifest(manifest: PluginManifest, source: &Path) -> Result<Self, PluginLoadError> {
        if manifest.rule_set.id.trim().is_empty() {
            return Err(PluginLoadError::Invalid(format!(
                "{}: rule set id must not be empty",
                source.display()
            )));
        }

        let mut metas = Vec::new();
        let mut rules = Vec::new();
        for def in &manifest.rules {
            if metas.iter().any(|m: &RuleMeta| m.id == def.id) {
                return Err(PluginLoadError::Invalid(format!(
                    "Duplicate rule '{}' in rule set '{}'",
                    def.id, manifest.rule_set.id
                )));
            }

            let severity = def.severity.parse::<Severity>().map_err(|_| {
                PluginLoadError::Invalid(format!("Rule '{}': invalid severity '{}'", def.id, def.severity))
            })?;

            let mut meta = RuleMeta::new(&def.id, &def.description).with_severity(severity);
            if !def.active {
                meta = meta.inactive_by_default();
            }
            if let Some(max) = def.max_lines {
                meta = meta.with_option(RuleOption::new("max_lines", max as u64, "Minimum size of reported nodes"));
            }

            rules.push(DeclaredRule {
                message: def.message.clone(),
                target: Target::from_definition(&def.id, &def.target)?,
                max_lines: def.max_lines,
            });
            metas.push(meta);
        }

        Ok(Self {
            id: manifest.rule_set.id,
            description: manifest.rule_set.description,
            source: source.to_path_buf(),
            metas,
            rules,
        })
    }

    /// Manifest the rule set was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl RuleSetProvider for DeclarativeRuleSet {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn is_builtin(&self) -> bool {
        false
    }

    fn rules(&self) -> &[RuleMeta] {
        &self.metas
    }

    fn create_rule(&self, rule_id: &str, config: &Config) -> Result<Box<dyn Rule>, ConfigError> {
        let index = self
            .metas
            .iter()
            .position(|m| m.id == rule_id)
            .ok_or_else(|| ConfigError::UnknownRule {
                rule_set: self.id.clone(),
                rule: rule_id.to_string(),
            })?;

        let mut rule = self.rules[index].clone();
        rule.max_lines = config.value_or_none("max_lines")?.or(rule.max_lines);
        Ok(Box::new(rule))
    }
}

impl Rule for DeclaredRule {
    fn visit(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
        let mut findings = Vec::new();
        for id in ctx.tree.walk() {
            let node = ctx.tree.node(id);
            if self.target.kind.is_some_and(|k| k != node.kind) {
                continue;
            }
            if let Some(matcher) = &self.target.name {
                match node.name() {
                    Some(name) if matcher.is_match(name) => {}
                    _ => continue,
                }
            }
            let lines = node.span.line_count();
            if self.max_lines.is_some_and(|max| lines <= max) {
                continue;
            }

            let message = self
                .message
                .replace("{name}", node.name().unwrap_or("<anonymous>"))
                .replace("{kind}", &node.kind.to_string())
                .replace("{lines}", &lines.to_string());
            findings.push(ctx.finding(id, &message));
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::instantiate;
    use crate::tree::{Span, SyntaxTree, TreeBuilder};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
rule_set:
  id: legacy
  description: "Legacy checks"

rules:
  - id: NoManagerClasses
    message: "Class {name} looks like a manager"
    target:
      kind: class
      name: "*Manager"
  - id: HugeLambda
    message: "{kind} spans {lines} lines"
    severity: error
    target:
      kind: lambda
    max_lines: 3
  - id: Disabled
    message: "never"
    active: false
"#;

    fn tree() -> SyntaxTree {
        let mut b = TreeBuilder::new("A.kt", Span::lines(1, 30));
        let class = b.add(b.root(), NodeKind::Class, Some("UserManager"), Span::lines(1, 20));
        b.add(class, NodeKind::Lambda, None, Span::lines(2, 10));
        b.add(class, NodeKind::Lambda, None, Span::lines(11, 12));
        b.add(b.root(), NodeKind::Class, Some("User"), Span::lines(21, 30));
        b.build()
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_yaml_manifest() {
        let dir = TempDir::new().unwrap();
        let set = DeclarativeRuleSet::load(&write(&dir, "legacy.yaml", MANIFEST)).unwrap();

        assert_eq!(set.id(), "legacy");
        assert_eq!(set.description(), "Legacy checks");
        assert!(!set.is_builtin());
        assert_eq!(set.rules().len(), 3);
        assert_eq!(set.rules()[1].severity, Severity::Error);
        assert!(!set.rules()[2].active_by_default);
        assert!(set.rules()[1].options.iter().any(|o| o.name == "max_lines"));
    }

    #[test]
    fn test_load_json_manifest() {
        let dir = TempDir::new().unwrap();
        let json = r#"{"rule_set": {"id": "json"}, "rules": [{"id": "R", "message": "m"}]}"#;
        let set = DeclarativeRuleSet::load(&write(&dir, "json.json", json)).unwrap();
        assert_eq!(set.id(), "json");
        assert_eq!(set.rules()[0].severity, Severity::Warning);
    }

    #[test]
    fn test_declared_rules_report() {
        let dir = TempDir::new().unwrap();
        let set = DeclarativeRuleSet::load(&write(&dir, "legacy.yaml", MANIFEST)).unwrap();
        let bound = instantiate(&set, &Config::empty(), false).unwrap();
        let tree = tree();

        let messages: Vec<_> = bound
            .active_rules()
            .flat_map(|r| r.visit(&tree).unwrap())
            .map(|f| format!("{}: {}", f.rule_id, f.message))
            .collect();
        assert_eq!(
            messages,
            vec![
                "NoManagerClasses: Class UserManager looks like a manager",
                "HugeLambda: lambda spans 9 lines",
            ]
        );
    }

    #[test]
    fn test_max_lines_from_config() {
        let dir = TempDir::new().unwrap();
        let set = DeclarativeRuleSet::load(&write(&dir, "legacy.yaml", MANIFEST)).unwrap();
        let config = Config::from_yaml_str("legacy:\n  HugeLambda:\n    max_lines: 1\n").unwrap();
        let bound = instantiate(&set, &config, false).unwrap();

        let count = bound.rules[1].visit(&tree()).unwrap().len();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_invalid_manifests() {
        let dir = TempDir::new().unwrap();

        let bad_severity = "rule_set: {id: x}\nrules:\n  - {id: R, message: m, severity: loud}\n";
        assert!(matches!(
            DeclarativeRuleSet::load(&write(&dir, "a.yaml", bad_severity)),
            Err(PluginLoadError::Invalid(_))
        ));

        let bad_kind = "rule_set: {id: x}\nrules:\n  - {id: R, message: m, target: {kind: module}}\n";
        assert!(matches!(
            DeclarativeRuleSet::load(&write(&dir, "b.yaml", bad_kind)),
            Err(PluginLoadError::Invalid(_))
        ));

        assert!(matches!(
            DeclarativeRuleSet::load(&write(&dir, "c.yaml", "rules: [")),
            Err(PluginLoadError::Parse { .. })
        ));

        assert!(matches!(
            DeclarativeRuleSet::load(&write(&dir, "d.toml", "x = 1")),
            Err(PluginLoadError::Invalid(_))
        ));
    }

    #[test]
    fn test_manifest_paths() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.yaml", MANIFEST);
        write(&dir, "a.json", "{}");
        write(&dir, "notes.txt", "ignored");
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("plugin.yml"), MANIFEST).unwrap();

        let names: Vec<_> = manifest_paths(dir.path())
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.yaml", "nested/plugin.yml"]);
    }
}
