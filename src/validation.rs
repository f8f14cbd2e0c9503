//! Configuration validation
//!
//! Walks a loaded configuration against the schema of every known rule set
//! and reports keys nobody reads. Typos are warnings; structurally wrong
//! values (a scalar where a nested scope is expected, or the reverse) are
//! errors and stop the run before any file is analyzed.

use crate::config::{Config, ConfigError, EngineSettings, ValidationSettings, KEY_SEPARATOR};
use crate::diagnostic::{Notification, NotificationLevel};
use crate::plugin::custom_instance_base;
use crate::rule::RuleMeta;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Key paths exempt from validation unless configured otherwise
pub const DEFAULT_EXCLUDES: [&str; 11] = [
    ".*>excludes",
    ".*>includes",
    ".*>active",
    ".*>.*>excludes",
    ".*>.*>includes",
    ".*>.*>active",
    ".*>severity",
    ".*>.*>severity",
    ".*>.*>aliases",
    ".*>.*>ignore_annotated",
    ".*>.*>ignore_function",
];

/// Expected shape of a configuration entry
#[derive(Debug, Clone, PartialEq)]
pub enum Expect {
    /// A scalar value
    Value,
    /// A list of scalars
    List,
    /// A nested scope
    Scope(BTreeMap<String, Expect>),
}

impl Expect {
    fn from_default(default: &Value) -> Self {
        match default {
            Value::Sequence(_) => Expect::List,
            Value::Mapping(_) => Expect::Scope(BTreeMap::new()),
            _ => Expect::Value,
        }
    }
}

/// The set of keys frost understands
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    root: BTreeMap<String, Expect>,
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSchema {
    /// Schema of the `engine` and `config` scopes
    pub fn new() -> Self {
        let engine = ["parallel", "jobs", "profiling", "all_rules", "fail_on", "max_issues"]
            .into_iter()
            .map(|k| (k.to_string(), Expect::Value))
            .collect();

        let mut config = BTreeMap::new();
        config.insert("validation".to_string(), Expect::Value);
        config.insert("warnings_as_errors".to_string(), Expect::Value);
        config.insert("excludes".to_string(), Expect::List);

        let mut root = BTreeMap::new();
        root.insert(EngineSettings::SCOPE.to_string(), Expect::Scope(engine));
        root.insert(ValidationSettings::SCOPE.to_string(), Expect::Scope(config));
        Self { root }
    }

    /// Add a rule set scope with one nested scope per rule
    pub fn add_rule_set(&mut self, id: &str, rules: &[RuleMeta]) {
        let scope = rules
            .iter()
            .map(|meta| {
                let options = meta
                    .options
                    .iter()
                    .map(|o| (o.name.clone(), Expect::from_default(&o.default)))
                    .collect();
                (meta.id.clone(), Expect::Scope(options))
            })
            .collect();
        self.root.insert(id.to_string(), Expect::Scope(scope));
    }

    pub fn contains_scope(&self, id: &str) -> bool {
        self.root.contains_key(id)
    }

    /// Validate `config`, returning one notification per problem
    ///
    /// Fails only when an exclusion pattern is not a valid regex.
    pub fn validate(
        &self,
        config: &Config,
        settings: &ValidationSettings,
    ) -> Result<Vec<Notification>, ConfigError> {
        if !settings.validation {
            return Ok(Vec::new());
        }

        let excludes = compile_excludes(&settings.excludes)?;
        let mut notifications = Vec::new();

        if let Some(Value::Mapping(map)) = config.node() {
            let mut walker = Walker {
                excludes: &excludes,
                notifications: &mut notifications,
            };
            walker.walk(&self.root, map, &mut Vec::new());
        }

        if settings.warnings_as_errors {
            for n in &mut notifications {
                n.level = NotificationLevel::Error;
            }
        }

        Ok(notifications)
    }
}

fn compile_excludes(extra: &[String]) -> Result<Vec<Regex>, ConfigError> {
    DEFAULT_EXCLUDES
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str))
        .map(|p| {
            Regex::new(&format!("^(?:{})$", p)).map_err(|e| {
                ConfigError::Invalid(format!("Invalid validation exclude pattern '{}': {}", p, e))
            })
        })
        .collect()
}

struct Walker<'a> {
    excludes: &'a [Regex],
    notifications: &'a mut Vec<Notification>,
}

impl Walker<'_> {
    fn walk(&mut self, schema: &BTreeMap<String, Expect>, map: &Mapping, path: &mut Vec<String>) {
        for (key, value) in map {
            let key = match key {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };

            path.push(key.clone());
            let key_path = path.join(KEY_SEPARATOR);

            if !self.excludes.iter().any(|re| re.is_match(&key_path)) {
                let expected = schema.get(&key).or_else(|| {
                    custom_instance_base(&key).and_then(|base| schema.get(base))
                });
                self.check(expected, value, &key_path, path);
            }

            path.pop();
        }
    }

    fn check(&mut self, expected: Option<&Expect>, value: &Value, key_path: &str, path: &mut Vec<String>) {
        match (expected, value) {
            (None, _) => self.warn(format!(
                "Property '{}' is misspelled or does not exist.",
                key_path
            )),
            (Some(Expect::Scope(sub)), Value::Mapping(m)) => self.walk(sub, m, path),
            (Some(Expect::Scope(_)), Value::Null) => {}
            (Some(Expect::Scope(_)), _) => self.error(format!("Nested config expected for '{}'.", key_path)),
            (Some(Expect::Value | Expect::List), Value::Mapping(_)) => {
                self.error(format!("Unexpected nested config for '{}'.", key_path))
            }
            (Some(Expect::List), Value::String(_)) => self.warn(format!(
                "Property '{}' should be a YAML array instead of a comma-separated String.",
                key_path
            )),
            (Some(_), _) => {}
        }
    }

    fn warn(&mut self, message: String) {
        self.notifications.push(Notification::warning(message));
    }

    fn error(&mut self, message: String) {
        self.notifications.push(Notification::error(message));
    }
}
