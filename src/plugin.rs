//! Rule set providers and their binding to configuration

use crate::config::{Config, ConfigError};
use crate::diagnostic::Severity;
use crate::rule::{Activation, PathFilter, Rule, RuleDescriptor, RuleInstance, RuleMeta, RuleSet};

/// A named group of rules that can be bound to a configuration scope
///
/// Built-in rule sets and rule sets loaded from manifests both implement
/// this trait; the registry does not distinguish them beyond
/// [`RuleSetProvider::is_builtin`].
pub trait RuleSetProvider: Send + Sync {
    /// Rule set identifier, also the top-level configuration key
    fn id(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Whether the provider ships with frost (affected by "disable defaults")
    fn is_builtin(&self) -> bool {
        true
    }

    /// Metadata of every rule the provider offers
    fn rules(&self) -> &[RuleMeta];

    /// Create the rule `rule_id`, reading its options from `config`
    fn create_rule(&self, rule_id: &str, config: &Config) -> Result<Box<dyn Rule>, ConfigError>;

    fn rule_meta(&self, rule_id: &str) -> Option<&RuleMeta> {
        self.rules().iter().find(|m| m.id == rule_id)
    }
}

/// Split a custom instance key `RuleId/suffix` into its rule id
pub fn custom_instance_base(key: &str) -> Option<&str> {
    key.split_once('/')
        .map(|(base, _)| base)
        .filter(|base| !base.is_empty())
}

/// Bind a provider to its configuration scope
///
/// Every rule the provider offers becomes an instance knowing whether it is
/// active: `all_rules` forces it on, an inactive rule set switches it off,
/// otherwise the rule's own `active` key wins over its compiled-in default.
/// Keys of the form `RuleId/suffix` add further instances of `RuleId`.
pub fn instantiate(
    provider: &dyn RuleSetProvider,
    config: &Config,
    all_rules: bool,
) -> Result<RuleSet, ConfigError> {
    let set_config = config.sub_config(provider.id());
    let set_active: bool = set_config.value_or_default("active", true)?;

    if !set_active && !all_rules {
        log::debug!("Rule set '{}' is inactive", provider.id());
    }

    let mut instances = Vec::new();
    for meta in provider.rules() {
        let rule_config = set_config.sub_config(&meta.id);
        instances.push(bind_rule(provider, meta, &meta.id, rule_config, set_active, all_rules)?);
    }

    for key in set_config.keys() {
        let Some(base) = custom_instance_base(&key) else {
            continue;
        };
        match provider.rule_meta(base) {
            Some(meta) => {
                let rule_config = set_config.sub_config(&key);
                instances.push(bind_rule(provider, meta, &key, rule_config, set_active, all_rules)?);
            }
            None => log::warn!(
                "Custom instance '{}' refers to unknown rule '{}' in rule set '{}'",
                key,
                base,
                provider.id()
            ),
        }
    }

    let path_filter = PathFilter::from_config(&set_config)?;
    Ok(RuleSet::new(provider.id(), instances, path_filter))
}

fn bind_rule(
    provider: &dyn RuleSetProvider,
    meta: &RuleMeta,
    instance_id: &str,
    rule_config: Config,
    set_active: bool,
    all_rules: bool,
) -> Result<RuleInstance, ConfigError> {
    let activation = if all_rules {
        Activation::Forced
    } else if !set_active {
        Activation::Explicit(false)
    } else {
        match rule_config.value_or_none::<bool>("active")? {
            Some(active) => Activation::Explicit(active),
            None => Activation::Default(meta.active_by_default),
        }
    };

    let severity = match rule_config.value_or_none::<String>("severity")? {
        Some(s) => s.parse::<Severity>().map_err(|_| {
            ConfigError::Invalid(format!(
                "'{}' is not a severity (info, warning, error)",
                rule_config.key_path("severity")
            ))
        })?,
        None => meta.severity,
    };

    let descriptor = RuleDescriptor {
        rule_set_id: provider.id().to_string(),
        rule_id: instance_id.to_string(),
        base_id: meta.id.clone(),
        activation,
        severity,
        category: meta.category,
        since: meta.since.clone(),
        aliases: rule_config.value_or_default("aliases", Vec::new())?,
    };

    if !descriptor.is_active() {
        log::debug!("Rule '{}' is inactive", descriptor.qualified_id());
    }

    let rule = provider.create_rule(&meta.id, &rule_config)?;
    RuleInstance::new(descriptor, rule_config, rule)
}
