//! End-to-end analysis run
//!
//! Loads and validates configuration, builds the registry and rule sets,
//! runs the engine and applies the extension pipeline.

use crate::config::{Config, ConfigError, EngineSettings, ValidationSettings};
use crate::diagnostic::Notification;
use crate::engine::Engine;
use crate::error::{Error, ExitStatus};
use crate::extension::{BaselineExtension, Extension, ExtensionPipeline};
use crate::plugin::RuleSetProvider;
use crate::plugin_manager::PluginLoadError;
use crate::registry::{DiscoveryOptions, RuleRegistry, RuleRestriction};
use crate::result::AnalysisResult;
use crate::tree::SyntaxTree;
use serde_yaml::Value;
use std::path::PathBuf;

/// Options of one run, typically taken from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Configuration files, layered in order
    pub config_paths: Vec<PathBuf>,
    /// Look for a default configuration file when no path is given
    pub default_config: bool,
    /// Values set on top of the loaded configuration
    pub overrides: Vec<(Vec<String>, Value)>,
    pub baseline: Option<PathBuf>,
    /// Write the baseline from the unfiltered findings
    pub create_baseline: bool,
    /// Directories searched for plugin manifests
    pub plugin_dirs: Vec<PathBuf>,
    pub discovery: DiscoveryOptions,
    pub restriction: RuleRestriction,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config_paths: Vec::new(),
            default_config: true,
            overrides: Vec::new(),
            baseline: None,
            create_baseline: false,
            plugin_dirs: Vec::new(),
            discovery: DiscoveryOptions::default(),
            restriction: RuleRestriction::All,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_paths.push(path.into());
        self
    }

    /// Use only the given configuration files
    pub fn without_default_config(mut self) -> Self {
        self.default_config = false;
        self
    }

    /// Override one configuration value, e.g. `["engine", "parallel"]`
    pub fn with_override(mut self, path: &[&str], value: impl Into<Value>) -> Self {
        self.overrides
            .push((path.iter().map(|s| s.to_string()).collect(), value.into()));
        self
    }

    pub fn with_baseline(mut self, path: impl Into<PathBuf>) -> Self {
        self.baseline = Some(path.into());
        self
    }

    pub fn creating_baseline(mut self) -> Self {
        self.create_baseline = true;
        self
    }

    pub fn with_plugin_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugin_dirs.push(path.into());
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryOptions) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_restriction(mut self, restriction: RuleRestriction) -> Self {
        self.restriction = restriction;
        self
    }
}

/// Final result of a run and the status it maps to
#[derive(Debug)]
pub struct RunOutcome {
    pub result: AnalysisResult,
    pub status: ExitStatus,
}

/// Drives one analysis run
pub struct Runner {
    options: RunOptions,
    providers: Vec<Box<dyn RuleSetProvider>>,
    extensions: Vec<Box<dyn Extension>>,
}

impl Runner {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            providers: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Register an additional rule set next to the built-in ones
    pub fn with_provider(mut self, provider: Box<dyn RuleSetProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_extension(mut self, extension: Box<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Load the layered configuration and apply overrides
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let mut config = if !self.options.config_paths.is_empty() {
            Config::load_layered(&self.options.config_paths)?
        } else if self.options.default_config {
            Config::load_default()?
        } else {
            Config::empty()
        };

        for (path, value) in &self.options.overrides {
            let keys: Vec<&str> = path.iter().map(String::as_str).collect();
            config.set(&keys, value.clone());
        }
        Ok(config)
    }

    /// Build the registry; plugins that fail to load become warnings
    fn build_registry(&mut self) -> Result<(RuleRegistry, Vec<Notification>), Error> {
        let mut registry = RuleRegistry::with_builtins();
        for provider in self.providers.drain(..) {
            registry.register(provider)?;
        }
        for dir in &self.options.plugin_dirs {
            registry.add_search_path(dir.clone());
        }

        let mut notifications = Vec::new();
        for loaded in registry.load_all() {
            match loaded {
                Ok(_) => {}
                Err(e @ PluginLoadError::DuplicateRuleSet(_)) => return Err(e.into()),
                Err(e) => {
                    log::warn!("Skipping plugin: {}", e);
                    notifications.push(Notification::warning(format!("Failed to load plugin: {}", e)));
                }
            }
        }
        Ok((registry, notifications))
    }

    /// Analyze `trees`
    pub fn run(mut self, trees: &[SyntaxTree]) -> Result<RunOutcome, Error> {
        if self.options.create_baseline && self.options.baseline.is_none() {
            return Err(ConfigError::Invalid("Creating a baseline requires a baseline path".to_string()).into());
        }

        let config = self.load_config()?;
        let (registry, mut notifications) = self.build_registry()?;

        let validation = ValidationSettings::from_config(&config)?;
        let problems = registry.schema().validate(&config, &validation)?;
        if problems.iter().any(Notification::is_error) {
            for problem in &problems {
                log::error!("{}", problem.message);
            }
            return Err(Error::InvalidConfig(problems));
        }
        notifications.extend(problems);

        let settings = EngineSettings::from_config(&config)?;
        let rule_sets = registry.build(
            &config,
            &self.options.discovery,
            &self.options.restriction,
            settings.all_rules,
        )?;
        log::info!(
            "Analyzing {} files with {} rule sets",
            trees.len(),
            rule_sets.len()
        );

        let fail_on = settings.fail_on;
        let max_issues = settings.max_issues;
        let result = Engine::new(settings, rule_sets)
            .with_default_collectors()
            .with_notifications(notifications)
            .run(trees);

        let mut pipeline = ExtensionPipeline::new();
        if let Some(path) = &self.options.baseline {
            let baseline = BaselineExtension::new(path.clone());
            pipeline.register(Box::new(if self.options.create_baseline {
                baseline.creating()
            } else {
                baseline
            }));
        }
        for extension in self.extensions.drain(..) {
            pipeline.register(extension);
        }
        let result = pipeline.run(result)?;

        let status = ExitStatus::of(&result, fail_on, max_issues);
        Ok(RunOutcome { result, status })
    }
}
