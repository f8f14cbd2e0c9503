//! Configuration tree
//!
//! Reads configuration from:
//! - `.frost.yml` / `.frost.yaml` / `.frost.json` / `frost.yml` (project-level)
//! - the same names in the home directory (user-level)
//! - any number of explicit files, layered in order
//!
//! The tree is a free-form mapping scoped by rule set, then rule:
//!
//! ```yaml
//! engine:
//!   parallel: true
//! complexity:
//!   active: true
//!   LongMethod:
//!     threshold: 40
//!     excludes: ["**/test/**"]
//! ```
//!
//! Lookups never fail for a missing key; they fall back to the caller's
//! default. A key holding a value of the wrong type is a fatal error that
//! names the full key path.

use crate::diagnostic::Severity;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Separator used when printing key paths, e.g. `complexity>LongMethod>threshold`
pub const KEY_SEPARATOR: &str = ">";

/// Names searched by [`Config::load_default`]
pub const DEFAULT_CONFIG_NAMES: [&str; 4] = [".frost.yml", ".frost.yaml", ".frost.json", "frost.yml"];

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Value of '{key}' must be {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("Rule '{rule}' not found in rule set '{rule_set}'")]
    UnknownRule { rule_set: String, rule: String },

    #[error("Rule set '{0}' not found")]
    UnknownRuleSet(String),
}

/// A type that can be read out of the configuration tree
pub trait ConfigValue: Sized {
    /// Human-readable type name used in mismatch errors
    const EXPECTED: &'static str;

    /// Convert a raw value, or `None` if it has the wrong shape
    fn from_value(value: &Value) -> Option<Self>;
}

impl ConfigValue for bool {
    const EXPECTED: &'static str = "a boolean";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl ConfigValue for String {
    const EXPECTED: &'static str = "a string";

    fn from_value(value: &Value) -> Option<Self> {
        scalar_to_string(value)
    }
}

impl ConfigValue for i64 {
    const EXPECTED: &'static str = "an integer";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl ConfigValue for usize {
    const EXPECTED: &'static str = "a non-negative integer";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().and_then(|v| usize::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl ConfigValue for f64 {
    const EXPECTED: &'static str = "a number";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl ConfigValue for Vec<String> {
    const EXPECTED: &'static str = "a list of strings";

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Sequence(items) => items.iter().map(scalar_to_string).collect(),
            // Comma separated strings are accepted but flagged by validation
            Value::String(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            _ => None,
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Short description of a raw value's shape for error messages
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean '{}'", b),
        Value::Number(n) => format!("number '{}'", n),
        Value::String(s) => format!("string '{}'", s),
        Value::Sequence(_) => "a list".to_string(),
        Value::Mapping(_) => "a nested configuration".to_string(),
        Value::Tagged(t) => format!("tagged value '{}'", t.tag),
    }
}

/// A scope inside the layered configuration tree
///
/// Cloning is cheap: every scope shares the same immutable tree.
#[derive(Debug, Clone)]
pub struct Config {
    root: Arc<Value>,
    scope: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::empty()
    }
}

impl Config {
    /// An empty configuration; every lookup returns its default
    pub fn empty() -> Self {
        Self::from_value(Value::Mapping(Mapping::new()))
    }

    pub fn from_value(value: Value) -> Self {
        let root = match value {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other,
        };
        Self {
            root: Arc::new(root),
            scope: Vec::new(),
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml::from_str(content)?;
        Self::from_document(value)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_document(value)
    }

    fn from_document(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Mapping(_) | Value::Null => Ok(Self::from_value(value)),
            other => Err(ConfigError::Invalid(format!(
                "top level must be a mapping, found {}",
                describe(&other)
            ))),
        }
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        let config = match ext {
            "yaml" | "yml" => Self::from_yaml_str(&content)?,
            "json" => Self::from_json_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load several files; later files override earlier ones leaf by leaf
    pub fn load_layered(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut config = Self::empty();
        for path in paths {
            config.merge(Self::load(path)?);
        }
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_default_from(Path::new("."))
    }

    /// Load the first default-named file found in `dir`, then in the home directory
    pub fn load_default_from(dir: &Path) -> Result<Self, ConfigError> {
        for name in &DEFAULT_CONFIG_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in &DEFAULT_CONFIG_NAMES {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::empty())
    }

    /// Merge another configuration on top of this one (other takes precedence)
    ///
    /// Mappings are merged recursively; any other value replaces the old one.
    pub fn merge(&mut self, other: Config) {
        let overlay = other.node().cloned().unwrap_or(Value::Null);
        let root = Arc::make_mut(&mut self.root);
        match scope_mut(root, &self.scope) {
            Some(target) => merge_values(target, overlay),
            None => log::warn!("Cannot merge into non-mapping scope {}", self.scope.join(KEY_SEPARATOR)),
        }
    }

    /// Set a single value below this scope, creating intermediate scopes
    pub fn set(&mut self, path: &[&str], value: Value) {
        let mut overlay = value;
        for key in path.iter().rev() {
            let mut map = Mapping::new();
            map.insert(Value::String((*key).to_string()), overlay);
            overlay = Value::Mapping(map);
        }
        self.merge(Config::from_value(overlay));
    }

    /// Scope below this one; empty when absent
    pub fn sub_config(&self, name: &str) -> Config {
        let mut scope = self.scope.clone();
        scope.push(name.to_string());
        Config {
            root: Arc::clone(&self.root),
            scope,
        }
    }

    /// Path of this scope, e.g. `["complexity", "LongMethod"]`
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Printable key path of `key` inside this scope
    pub fn key_path(&self, key: &str) -> String {
        let mut parts: Vec<&str> = self.scope.iter().map(String::as_str).collect();
        parts.push(key);
        parts.join(KEY_SEPARATOR)
    }

    /// Raw value of this scope, if present
    pub fn node(&self) -> Option<&Value> {
        let mut current = self.root.as_ref();
        for key in &self.scope {
            current = current.as_mapping()?.get(key.as_str())?;
        }
        Some(current)
    }

    /// Whether this scope exists in the tree
    pub fn exists(&self) -> bool {
        self.node().is_some()
    }

    /// Raw value of `key` inside this scope
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.node()?.as_mapping()?.get(key)
    }

    /// Keys directly inside this scope, in document order
    pub fn keys(&self) -> Vec<String> {
        self.node()
            .and_then(Value::as_mapping)
            .map(|m| m.keys().filter_map(scalar_to_string).collect())
            .unwrap_or_default()
    }

    /// Typed lookup falling back to `default` when the key is absent
    pub fn value_or_default<T: ConfigValue>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.value_or_none(key)?.unwrap_or(default))
    }

    /// Typed lookup; `None` when the key is absent or null
    pub fn value_or_none<T: ConfigValue>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.raw(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value).map(Some).ok_or_else(|| ConfigError::TypeMismatch {
                key: self.key_path(key),
                expected: T::EXPECTED,
                found: describe(value),
            }),
        }
    }
}

fn scope_mut<'a>(root: &'a mut Value, scope: &[String]) -> Option<&'a mut Value> {
    let mut current = root;
    for key in scope {
        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        current = current
            .as_mapping_mut()?
            .entry(Value::String(key.clone()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
    Some(current)
}

/// Deep merge `overlay` into `base` at the leaf level
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}

/// Engine settings read from the `engine` scope
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Run files in parallel
    pub parallel: bool,
    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,
    /// Record per rule and file execution times
    pub profiling: bool,
    /// Activate every discovered rule regardless of configuration
    pub all_rules: bool,
    /// Lowest severity that counts towards failing the run
    pub fail_on: Severity,
    /// Findings tolerated at or above `fail_on` before the run fails
    pub max_issues: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            parallel: false,
            jobs: 0,
            profiling: false,
            all_rules: false,
            fail_on: Severity::Error,
            max_issues: 0,
        }
    }
}

impl EngineSettings {
    pub const SCOPE: &'static str = "engine";

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let engine = config.sub_config(Self::SCOPE);
        let defaults = Self::default();

        let fail_on = match engine.value_or_none::<String>("fail_on")? {
            Some(s) => s.parse::<Severity>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "'{}' is not a severity (info, warning, error)",
                    engine.key_path("fail_on")
                ))
            })?,
            None => defaults.fail_on,
        };

        Ok(Self {
            parallel: engine.value_or_default("parallel", defaults.parallel)?,
            jobs: engine.value_or_default("jobs", defaults.jobs)?,
            profiling: engine.value_or_default("profiling", defaults.profiling)?,
            all_rules: engine.value_or_default("all_rules", defaults.all_rules)?,
            fail_on,
            max_issues: engine.value_or_default("max_issues", defaults.max_issues)?,
        })
    }

    /// Worker count, resolving 0 to the number of CPUs
    pub fn effective_jobs(&self) -> usize {
        if self.jobs > 0 {
            self.jobs
        } else {
            num_cpus::get()
        }
    }
}

/// Validation settings read from the `config` scope
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSettings {
    pub validation: bool,
    pub warnings_as_errors: bool,
    /// Extra key path patterns exempt from validation
    pub excludes: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            validation: true,
            warnings_as_errors: false,
            excludes: Vec::new(),
        }
    }
}

impl ValidationSettings {
    pub const SCOPE: &'static str = "config";

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let scope = config.sub_config(Self::SCOPE);
        Ok(Self {
            validation: scope.value_or_default("validation", true)?,
            warnings_as_errors: scope.value_or_default("warnings_as_errors", false)?,
            excludes: scope.value_or_default("excludes", Vec::new())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_keys_return_default() {
        let config = Config::from_yaml_str("complexity:\n  active: true\n").unwrap();
        let scope = config.sub_config("complexity").sub_config("NoSuchRule");

        assert!(scope.value_or_default("flag", true).unwrap());
        assert!(!scope.value_or_default("flag", false).unwrap());
        assert_eq!(
            scope.value_or_default("name", "fallback".to_string()).unwrap(),
            "fallback"
        );
        assert_eq!(
            scope
                .value_or_default("list", vec!["a".to_string(), "b".to_string()])
                .unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(scope.value_or_default("count", 7usize).unwrap(), 7);
        assert_eq!(scope.value_or_default("ratio", 0.5f64).unwrap(), 0.5);
    }

    #[test]
    fn test_empty_config_never_fails() {
        let config = Config::empty();
        let deep = config.sub_config("a").sub_config("b").sub_config("c");
        assert!(!deep.exists());
        assert_eq!(deep.value_or_default("x", 3i64).unwrap(), 3);
        assert!(deep.keys().is_empty());
    }

    #[test]
    fn test_typed_values() {
        let config = Config::from_yaml_str(
            r#"
rules:
  flag: "true"
  count: "12"
  threshold: 30
  names: [a, b, 3]
  csv: "x, y"
"#,
        )
        .unwrap();
        let rules = config.sub_config("rules");

        assert!(rules.value_or_default("flag", false).unwrap());
        assert_eq!(rules.value_or_default("count", 0i64).unwrap(), 12);
        assert_eq!(rules.value_or_default("threshold", 0usize).unwrap(), 30);
        assert_eq!(
            rules.value_or_default("names", Vec::<String>::new()).unwrap(),
            vec!["a", "b", "3"]
        );
        assert_eq!(
            rules.value_or_default("csv", Vec::<String>::new()).unwrap(),
            vec!["x", "y"]
        );
    }

    #[test]
    fn test_type_mismatch_names_key_path() {
        let config = Config::from_yaml_str("complexity:\n  LongMethod:\n    threshold: [1, 2]\n").unwrap();
        let rule = config.sub_config("complexity").sub_config("LongMethod");

        let err = rule.value_or_default("threshold", 60usize).unwrap_err();
        match err {
            ConfigError::TypeMismatch { key, expected, .. } => {
                assert_eq!(key, "complexity>LongMethod>threshold");
                assert_eq!(expected, "a non-negative integer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bool_mismatch() {
        let config = Config::from_yaml_str("engine:\n  parallel: sometimes\n").unwrap();
        assert!(EngineSettings::from_config(&config).is_err());
    }

    #[test]
    fn test_layered_merge_is_leaf_level() {
        let mut base = Config::from_yaml_str(
            r#"
complexity:
  active: true
  LongMethod:
    threshold: 60
    active: true
"#,
        )
        .unwrap();
        let overlay = Config::from_yaml_str(
            r#"
complexity:
  LongMethod:
    threshold: 30
"#,
        )
        .unwrap();
        base.merge(overlay);

        let rule = base.sub_config("complexity").sub_config("LongMethod");
        assert_eq!(rule.value_or_default("threshold", 0usize).unwrap(), 30);
        assert!(rule.value_or_default("active", false).unwrap());
        assert!(base.sub_config("complexity").value_or_default("active", false).unwrap());
    }

    #[test]
    fn test_set_creates_scopes() {
        let mut config = Config::empty();
        config.set(&["engine", "parallel"], Value::Bool(true));
        config.set(&["engine", "jobs"], Value::Number(4u64.into()));

        let settings = EngineSettings::from_config(&config).unwrap();
        assert!(settings.parallel);
        assert_eq!(settings.jobs, 4);
        assert_eq!(settings.effective_jobs(), 4);
    }

    #[test]
    fn test_engine_settings_defaults() {
        let settings = EngineSettings::from_config(&Config::empty()).unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert!(settings.effective_jobs() >= 1);
    }

    #[test]
    fn test_engine_fail_on() {
        let config = Config::from_yaml_str("engine:\n  fail_on: warning\n").unwrap();
        assert_eq!(EngineSettings::from_config(&config).unwrap().fail_on, Severity::Warning);

        let bad = Config::from_yaml_str("engine:\n  fail_on: loud\n").unwrap();
        assert!(matches!(
            EngineSettings::from_config(&bad),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_keys_in_document_order() {
        let config = Config::from_yaml_str("b: 1\na: 2\nc: {}\n").unwrap();
        assert_eq!(config.keys(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_load_by_extension() {
        let temp = TempDir::new().unwrap();
        let yaml = temp.path().join("one.yml");
        let json = temp.path().join("two.json");
        fs::write(&yaml, "engine:\n  parallel: true\n  jobs: 2\n").unwrap();
        fs::write(&json, r#"{"engine": {"jobs": 8}}"#).unwrap();

        let config = Config::load_layered(&[yaml, json]).unwrap();
        let settings = EngineSettings::from_config(&config).unwrap();
        assert!(settings.parallel);
        assert_eq!(settings.jobs, 8);

        let toml = temp.path().join("three.toml");
        fs::write(&toml, "").unwrap();
        assert!(matches!(Config::load(&toml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_default_from_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".frost.yml"), "config:\n  warnings_as_errors: true\n").unwrap();

        let config = Config::load_default_from(temp.path()).unwrap();
        let validation = ValidationSettings::from_config(&config).unwrap();
        assert!(validation.validation);
        assert!(validation.warnings_as_errors);
    }

    #[test]
    fn test_top_level_must_be_mapping() {
        assert!(Config::from_yaml_str("- a\n- b\n").is_err());
        assert!(Config::from_yaml_str("{}").is_ok());
    }
}
