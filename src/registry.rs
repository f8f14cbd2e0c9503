//! Rule registry
//!
//! Holds every known rule set provider: the built-in ones and those loaded
//! from plugin manifests. Discovery filters providers by id and origin;
//! building binds the discovered providers to the configuration.

use crate::config::{Config, ConfigError};
use crate::plugin::{custom_instance_base, instantiate, RuleSetProvider};
use crate::plugin_manager::{manifest_paths, DeclarativeRuleSet, PluginLoadError};
use crate::rule::{Activation, RuleSet};
use crate::rulesets::builtin_providers;
use crate::validation::ConfigSchema;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Which providers discovery skips
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Rule set ids to leave out
    pub disabled: BTreeSet<String>,
    /// Leave out every built-in rule set
    pub disable_defaults: bool,
}

impl DiscoveryOptions {
    pub fn disable(mut self, id: &str) -> Self {
        self.disabled.insert(id.to_string());
        self
    }

    pub fn without_defaults(mut self) -> Self {
        self.disable_defaults = true;
        self
    }

    fn admits(&self, provider: &dyn RuleSetProvider) -> bool {
        !self.disabled.contains(provider.id()) && !(self.disable_defaults && provider.is_builtin())
    }
}

/// Which rules of the discovered providers run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RuleRestriction {
    /// Every discovered rule, according to configuration
    #[default]
    All,
    /// Exactly one rule, forced on
    Single { rule_set: String, rule: String },
}

impl std::str::FromStr for RuleRestriction {
    type Err = ConfigError;

    /// Parse `ruleSet:rule`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((rule_set, rule)) if !rule_set.is_empty() && !rule.is_empty() => Ok(RuleRestriction::Single {
                rule_set: rule_set.to_string(),
                rule: rule.to_string(),
            }),
            _ => Err(ConfigError::Invalid(format!(
                "Rule restriction '{}' must have the form 'ruleSet:rule'",
                s
            ))),
        }
    }
}

/// Registered rule set providers
pub struct RuleRegistry {
    providers: Vec<Box<dyn RuleSetProvider>>,
    search_paths: Vec<PathBuf>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            search_paths: Vec::new(),
        }
    }

    /// A registry holding the built-in rule sets
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.providers.extend(builtin_providers());
        registry
    }

    /// Register a provider; ids must be unique
    pub fn register(&mut self, provider: Box<dyn RuleSetProvider>) -> Result<(), PluginLoadError> {
        if self.provider(provider.id()).is_some() {
            return Err(PluginLoadError::DuplicateRuleSet(provider.id().to_string()));
        }
        log::debug!("Registered rule set '{}'", provider.id());
        self.providers.push(provider);
        Ok(())
    }

    pub fn add_search_path(&mut self, path: PathBuf) {
        self.search_paths.push(path);
    }

    /// Load one manifest and register its rule set
    pub fn load_plugin(&mut self, manifest: &Path) -> Result<String, PluginLoadError> {
        let rule_set = DeclarativeRuleSet::load(manifest)?;
        let id = rule_set.id().to_string();
        self.register(Box::new(rule_set))?;
        log::info!("Loaded rule set '{}' from {}", id, manifest.display());
        Ok(id)
    }

    /// Load every manifest found in the search paths
    pub fn load_all(&mut self) -> Vec<Result<String, PluginLoadError>> {
        let manifests: Vec<PathBuf> = self
            .search_paths
            .iter()
            .filter(|p| p.is_dir())
            .flat_map(|p| manifest_paths(p))
            .collect();

        manifests.iter().map(|m| self.load_plugin(m)).collect()
    }

    pub fn providers(&self) -> impl Iterator<Item = &dyn RuleSetProvider> {
        self.providers.iter().map(|p| p.as_ref())
    }

    pub fn provider(&self, id: &str) -> Option<&dyn RuleSetProvider> {
        self.providers().find(|p| p.id() == id)
    }

    /// Providers left after applying `options`
    pub fn discover(&self, options: &DiscoveryOptions) -> Vec<&dyn RuleSetProvider> {
        self.providers()
            .filter(|p| {
                let admitted = options.admits(*p);
                if !admitted {
                    log::debug!("Rule set '{}' is disabled", p.id());
                }
                admitted
            })
            .collect()
    }

    /// Discover providers and bind them to `config`
    ///
    /// A single-rule restriction fails when the rule set or rule does not
    /// exist among the discovered providers.
    pub fn build(
        &self,
        config: &Config,
        options: &DiscoveryOptions,
        restriction: &RuleRestriction,
        all_rules: bool,
    ) -> Result<Vec<RuleSet>, ConfigError> {
        let providers = self.discover(options);

        match restriction {
            RuleRestriction::All => providers
                .into_iter()
                .map(|p| instantiate(p, config, all_rules))
                .collect(),
            RuleRestriction::Single { rule_set, rule } => {
                let provider = providers
                    .into_iter()
                    .find(|p| p.id() == rule_set)
                    .ok_or_else(|| ConfigError::UnknownRuleSet(rule_set.clone()))?;

                let base = custom_instance_base(rule).unwrap_or(rule);
                let unknown = || ConfigError::UnknownRule {
                    rule_set: rule_set.clone(),
                    rule: rule.clone(),
                };
                if provider.rule_meta(base).is_none() {
                    return Err(unknown());
                }

                let mut set = instantiate(provider, config, true)?;
                set.rules.retain(|r| r.descriptor.rule_id == *rule);
                if set.rules.is_empty() {
                    return Err(unknown());
                }
                for r in &mut set.rules {
                    r.descriptor.activation = Activation::Forced;
                }
                log::info!("Running only {}:{}", rule_set, rule);
                Ok(vec![set])
            }
        }
    }

    /// Validation schema covering every registered rule set
    pub fn schema(&self) -> ConfigSchema {
        let mut schema = ConfigSchema::new();
        for provider in self.providers() {
            schema.add_rule_set(provider.id(), provider.rules());
        }
        schema
    }
}
