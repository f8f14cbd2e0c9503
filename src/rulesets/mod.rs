//! Built-in rule sets

pub mod complexity;
pub mod guard;
pub mod style;

use crate::plugin::RuleSetProvider;

pub use complexity::ComplexityProvider;
pub use guard::GuardProvider;
pub use style::StyleProvider;

/// Every rule set shipped with frost
pub fn builtin_providers() -> Vec<Box<dyn RuleSetProvider>> {
    vec![
        Box::new(ComplexityProvider::new()),
        Box::new(StyleProvider::new()),
        Box::new(GuardProvider::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_builtin_ids_are_unique() {
        let providers = builtin_providers();
        let mut ids: Vec<_> = providers.iter().map(|p| p.id().to_string()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), providers.len());
    }

    #[test]
    fn test_every_rule_can_be_created() {
        for provider in builtin_providers() {
            assert!(provider.is_builtin());
            for meta in provider.rules() {
                assert!(
                    provider.create_rule(&meta.id, &Config::empty()).is_ok(),
                    "{}:{}",
                    provider.id(),
                    meta.id
                );
            }
            assert!(provider.create_rule("NoSuchRule", &Config::empty()).is_err());
        }
    }
}
