//! Execution engine
//!
//! A run moves through `Idle -> Scheduling -> Executing -> Aggregating ->
//! Done`. Scheduling pairs every file with the active rules that accept it;
//! execution runs each file's full rule pass as one unit, sequentially or on
//! a rayon pool. Findings that survive suppression are appended to a
//! concurrent accumulator keyed by rule set id; notifications, profiling
//! records and metrics are collected per file and merged in file order
//! afterwards.

use crate::config::EngineSettings;
use crate::diagnostic::{Finding, Notification};
use crate::metrics::{default_collectors, MetricCollector, MetricTable};
use crate::profiling::{ExecutionRecord, Profile};
use crate::result::{AnalysisResult, ResultAggregator};
use crate::rule::{RuleError, RuleInstance, RuleSet};
use crate::suppression::Decision;
use crate::tree::SyntaxTree;
use dashmap::DashMap;
use rayon::prelude::*;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Phase of an engine run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Scheduling,
    Executing,
    Aggregating,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Scheduling => write!(f, "scheduling"),
            RunPhase::Executing => write!(f, "executing"),
            RunPhase::Aggregating => write!(f, "aggregating"),
            RunPhase::Done => write!(f, "done"),
        }
    }
}

/// One scheduled (file, rule) pair, by index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitRef {
    pub rule_set: usize,
    pub rule: usize,
}

/// The rule units scheduled for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlan {
    /// Index of the tree in the run's input
    pub file: usize,
    pub units: Vec<UnitRef>,
}

/// Position of a finding in sequential execution order
type UnitKey = (usize, usize);

/// Findings accumulated across workers, keyed by rule set id
type Accumulator = DashMap<String, Vec<(UnitKey, Finding)>>;

/// Everything but findings produced while analyzing one file
#[derive(Debug, Default)]
struct FileOutcome {
    notifications: Vec<Notification>,
    profile: Profile,
    metrics: MetricTable,
}

/// Runs rule sets over syntax trees
pub struct Engine {
    settings: EngineSettings,
    rule_sets: Vec<RuleSet>,
    collectors: Vec<Box<dyn MetricCollector>>,
    notifications: Vec<Notification>,
    phase: RunPhase,
}

impl Engine {
    pub fn new(settings: EngineSettings, rule_sets: Vec<RuleSet>) -> Self {
        Self {
            settings,
            rule_sets,
            collectors: Vec::new(),
            notifications: Vec::new(),
            phase: RunPhase::Idle,
        }
    }

    pub fn with_collector(mut self, collector: Box<dyn MetricCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_default_collectors(mut self) -> Self {
        self.collectors.extend(default_collectors());
        self
    }

    /// Notifications raised before the run, e.g. by configuration validation
    pub fn with_notifications(mut self, notifications: Vec<Notification>) -> Self {
        self.notifications.extend(notifications);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: RunPhase) {
        log::debug!("Engine phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Pair every file with the active rules that accept it
    pub fn schedule(&self, trees: &[SyntaxTree]) -> Vec<FilePlan> {
        trees
            .iter()
            .enumerate()
            .map(|(file, tree)| {
                let units = self
                    .rule_sets
                    .iter()
                    .enumerate()
                    .flat_map(|(rule_set, set)| {
                        set.rules_for(tree.path())
                            .into_iter()
                            .map(move |rule| UnitRef { rule_set, rule })
                    })
                    .collect();
                FilePlan { file, units }
            })
            .collect()
    }

    /// Analyze `trees` and aggregate the result
    pub fn run(&mut self, trees: &[SyntaxTree]) -> AnalysisResult {
        let start = Instant::now();

        self.set_phase(RunPhase::Scheduling);
        let plans = self.schedule(trees);
        let units: usize = plans.iter().map(|p| p.units.len()).sum();
        log::info!("Scheduled {} rule units over {} files", units, trees.len());

        self.set_phase(RunPhase::Executing);
        let accumulator = Accumulator::new();
        let outcomes = self.execute(trees, &plans, &accumulator);

        self.set_phase(RunPhase::Aggregating);
        let mut aggregator = ResultAggregator::new();
        aggregator.add_notifications(self.notifications.iter().cloned());
        for (rule_set, mut findings) in accumulator {
            // Sequential order first so equal report keys tie-break the same way every run
            findings.sort_by_key(|(key, _)| *key);
            aggregator.add_findings(&rule_set, findings.into_iter().map(|(_, f)| f).collect());
        }
        for outcome in outcomes {
            aggregator.add_notifications(outcome.notifications);
            aggregator.add_metrics(outcome.metrics);
            if self.settings.profiling {
                aggregator.add_profile(outcome.profile);
            }
        }
        let result = aggregator.build();

        self.set_phase(RunPhase::Done);
        log::info!(
            "Analyzed {} files in {:.2?}: {} findings, {} notifications",
            trees.len(),
            start.elapsed(),
            result.findings().len(),
            result.notifications().len()
        );
        result
    }

    fn execute(&self, trees: &[SyntaxTree], plans: &[FilePlan], accumulator: &Accumulator) -> Vec<FileOutcome> {
        let sequential = || -> Vec<FileOutcome> {
            plans
                .iter()
                .map(|plan| self.run_file(&trees[plan.file], plan, accumulator))
                .collect()
        };

        if !self.settings.parallel {
            return sequential();
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.effective_jobs())
            .build()
        {
            Ok(pool) => pool.install(|| {
                plans
                    .par_iter()
                    .map(|plan| self.run_file(&trees[plan.file], plan, accumulator))
                    .collect()
            }),
            Err(e) => {
                log::warn!("Could not build thread pool ({}), running sequentially", e);
                sequential()
            }
        }
    }

    /// One file's full rule pass
    fn run_file(&self, tree: &SyntaxTree, plan: &FilePlan, accumulator: &Accumulator) -> FileOutcome {
        let mut outcome = FileOutcome::default();

        for collector in &self.collectors {
            for (metric, value) in collector.collect(tree) {
                outcome.metrics.add(tree.path(), &metric, value);
            }
        }

        for (position, unit) in plan.units.iter().enumerate() {
            let rule_set = &self.rule_sets[unit.rule_set];
            let rule = &rule_set.rules[unit.rule];

            if rule.suppression.suppresses_file(tree) {
                log::debug!(
                    "Rule '{}' suppressed for {}",
                    rule.descriptor.qualified_id(),
                    tree.path().display()
                );
                continue;
            }

            let started = Instant::now();
            let visited = visit_isolated(rule, tree);
            let elapsed = started.elapsed();

            let raw = match visited {
                Ok(findings) => findings,
                Err(e) => {
                    log::warn!(
                        "Rule '{}' failed on {}: {}",
                        rule.descriptor.qualified_id(),
                        tree.path().display(),
                        e
                    );
                    outcome.notifications.push(Notification::error(format!(
                        "Rule '{}' failed on {}: {}",
                        rule.descriptor.qualified_id(),
                        tree.path().display(),
                        e
                    )));
                    continue;
                }
            };

            if self.settings.profiling {
                outcome.profile.record(ExecutionRecord {
                    rule_set: rule_set.id.clone(),
                    rule: rule.id().to_string(),
                    file: tree.path().to_path_buf(),
                    duration: elapsed,
                    findings: raw.len(),
                });
            }

            let mut kept = Vec::with_capacity(raw.len());
            for finding in raw {
                match rule.suppression.decide(&finding, tree) {
                    Decision::Keep => kept.push(finding),
                    Decision::Suppressed(by) => {
                        log::trace!("Suppressed {} by {}", finding.baseline_id(), by);
                    }
                    Decision::Blocked(notification) => {
                        outcome.notifications.push(notification);
                        kept.push(finding);
                    }
                }
            }

            if !kept.is_empty() {
                let key = (plan.file, position);
                accumulator
                    .entry(rule_set.id.clone())
                    .or_default()
                    .extend(kept.into_iter().map(|f| (key, f)));
            }
        }

        outcome
    }
}

/// Visit `tree`, turning a panic into a rule error
fn visit_isolated(rule: &RuleInstance, tree: &SyntaxTree) -> Result<Vec<Finding>, RuleError> {
    panic::catch_unwind(AssertUnwindSafe(|| rule.visit(tree)))
        .unwrap_or_else(|payload| Err(RuleError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::diagnostic::{NotificationLevel, Severity};
    use crate::rule::{Activation, PathFilter, Rule, RuleCategory, RuleContext, RuleDescriptor};
    use crate::tree::{Annotation, NodeKind, Span, TreeBuilder};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Reports every function
    struct FunctionRule;

    impl Rule for FunctionRule {
        fn visit(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
            Ok(ctx
                .tree
                .walk()
                .filter(|id| ctx.tree.node(*id).kind == NodeKind::Function)
                .map(|id| ctx.finding(id, "function"))
                .collect())
        }
    }

    /// Reports every class and counts visits
    struct ClassRule(Arc<AtomicUsize>);

    impl Rule for ClassRule {
        fn visit(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ctx
                .tree
                .walk()
                .filter(|id| ctx.tree.node(*id).kind == NodeKind::Class)
                .map(|id| ctx.finding(id, "class"))
                .collect())
        }
    }

    struct PanickingRule;

    impl Rule for PanickingRule {
        fn visit(&self, _ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
            panic!("rule exploded")
        }
    }

    struct FailingRule;

    impl Rule for FailingRule {
        fn visit(&self, _ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleError> {
            Err(RuleError::Failed("cannot analyze".to_string()))
        }
    }

    fn instance(set: &str, id: &str, category: RuleCategory, rule: Box<dyn Rule>) -> RuleInstance {
        let descriptor = RuleDescriptor {
            rule_set_id: set.to_string(),
            rule_id: id.to_string(),
            base_id: id.to_string(),
            activation: Activation::Default(true),
            severity: Severity::Warning,
            category,
            since: None,
            aliases: Vec::new(),
        };
        RuleInstance::new(descriptor, Config::empty(), rule).unwrap()
    }

    fn rule_set(id: &str, rules: Vec<RuleInstance>) -> RuleSet {
        RuleSet::new(id, rules, PathFilter::default())
    }

    /// `file_{n}.kt` with two classes of two functions each
    fn tree(n: usize) -> SyntaxTree {
        let mut b = TreeBuilder::new(format!("src/file_{}.kt", n), Span::lines(1, 40));
        for c in 0..2 {
            let line = 1 + c * 20;
            let class = b.add(b.root(), NodeKind::Class, Some(format!("C{}", c).as_str()), Span::lines(line, line + 19));
            for f in 0..2 {
                let fl = line + 1 + f * 5;
                b.add(class, NodeKind::Function, Some(format!("f{}", f).as_str()), Span::lines(fl, fl + 4));
            }
        }
        b.build()
    }

    fn settings(parallel: bool) -> EngineSettings {
        EngineSettings {
            parallel,
            jobs: 4,
            ..EngineSettings::default()
        }
    }

    fn keys(result: &AnalysisResult) -> Vec<String> {
        result
            .findings()
            .iter()
            .map(|f| format!("{}@{}", f.baseline_id(), f.location()))
            .collect()
    }

    #[test]
    fn test_schedule() {
        let counter = Arc::new(AtomicUsize::new(0));
        let engine = Engine::new(
            settings(false),
            vec![
                rule_set("a", vec![instance("a", "F", RuleCategory::Style, Box::new(FunctionRule))]),
                rule_set(
                    "b",
                    vec![instance("b", "C", RuleCategory::Style, Box::new(ClassRule(counter)))],
                ),
            ],
        );
        let plans = engine.schedule(&[tree(0)]);
        assert_eq!(
            plans,
            vec![FilePlan {
                file: 0,
                units: vec![UnitRef { rule_set: 0, rule: 0 }, UnitRef { rule_set: 1, rule: 0 }],
            }]
        );
        assert_eq!(engine.phase(), RunPhase::Idle);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let trees: Vec<_> = (0..16).rev().map(tree).collect();
        let build = |parallel| {
            let counter = Arc::new(AtomicUsize::new(0));
            Engine::new(
                settings(parallel),
                vec![
                    rule_set("b", vec![instance("b", "C", RuleCategory::Style, Box::new(ClassRule(counter)))]),
                    rule_set("a", vec![instance("a", "F", RuleCategory::Style, Box::new(FunctionRule))]),
                ],
            )
            .with_default_collectors()
        };

        let mut sequential = build(false);
        let mut parallel = build(true);
        let a = sequential.run(&trees);
        let b = parallel.run(&trees);

        assert_eq!(a.findings().len(), 16 * 6);
        assert_eq!(keys(&a), keys(&b));
        assert_eq!(a, b);
        assert_eq!(a.metric("files"), Some(16));
        assert_eq!(a.metric("functions"), Some(64));
        assert_eq!(sequential.phase(), RunPhase::Done);
    }

    #[test]
    fn test_failing_rules_are_isolated() {
        let mut engine = Engine::new(
            settings(false),
            vec![rule_set(
                "s",
                vec![
                    instance("s", "Boom", RuleCategory::Style, Box::new(PanickingRule)),
                    instance("s", "Broken", RuleCategory::Style, Box::new(FailingRule)),
                    instance("s", "F", RuleCategory::Style, Box::new(FunctionRule)),
                ],
            )],
        );
        let result = engine.run(&[tree(0), tree(1)]);

        assert_eq!(result.findings().len(), 8);
        assert!(result.findings().iter().all(|f| f.rule_id == "F"));

        let messages: Vec<_> = result.notifications().iter().map(|n| n.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Rule 's:Boom' failed on src/file_0.kt: Rule panicked: rule exploded",
                "Rule 's:Broken' failed on src/file_0.kt: cannot analyze",
                "Rule 's:Boom' failed on src/file_1.kt: Rule panicked: rule exploded",
                "Rule 's:Broken' failed on src/file_1.kt: cannot analyze",
            ]
        );
        assert!(result.notifications().iter().all(|n| n.level == NotificationLevel::Error));
    }

    #[test]
    fn test_marker_suppression() {
        let mut b = TreeBuilder::new("A.kt", Span::lines(1, 20));
        b.add(b.root(), NodeKind::Function, Some("kept"), Span::lines(1, 5));
        let dropped = b.add(b.root(), NodeKind::Function, Some("dropped"), Span::lines(6, 10));
        let other = b.add(b.root(), NodeKind::Function, Some("other"), Span::lines(11, 15));
        b.annotate(dropped, Annotation::new("Suppress", &["F"]));
        b.annotate(other, Annotation::new("Suppress", &["Unrelated"]));
        let tree = b.build();

        let mut engine = Engine::new(
            settings(false),
            vec![rule_set("s", vec![instance("s", "F", RuleCategory::Style, Box::new(FunctionRule))])],
        );
        let result = engine.run(&[tree]);
        let names: Vec<_> = result.findings().iter().map(|f| f.entity.name.as_str()).collect();
        assert_eq!(names, vec!["kept", "other"]);
    }

    #[test]
    fn test_file_marker_skips_visit() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut b = TreeBuilder::new("A.kt", Span::lines(1, 20));
        b.add(b.root(), NodeKind::Class, Some("A"), Span::lines(1, 20));
        let root = b.root();
        b.annotate(root, Annotation::new("Suppress", &["frost:C"]));
        let suppressed = b.build();

        let mut engine = Engine::new(
            settings(false),
            vec![rule_set(
                "s",
                vec![instance("s", "C", RuleCategory::Style, Box::new(ClassRule(Arc::clone(&counter))))],
            )],
        );
        let result = engine.run(&[suppressed, tree(1)]);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(result.findings().len(), 2);
    }

    #[test]
    fn test_guard_rules_ignore_suppression() {
        let mut b = TreeBuilder::new("A.kt", Span::lines(1, 20));
        let f = b.add(b.root(), NodeKind::Function, Some("f"), Span::lines(1, 5));
        b.annotate(f, Annotation::new("Suppress", &["all"]));
        let tree = b.build();

        let mut engine = Engine::new(
            settings(false),
            vec![rule_set("guard", vec![instance("guard", "F", RuleCategory::Guard, Box::new(FunctionRule))])],
        );
        let result = engine.run(&[tree]);

        assert_eq!(result.findings().len(), 1);
        assert_eq!(result.notifications().len(), 1);
        assert!(result.notifications()[0].message.starts_with("Rule 'guard:F' cannot be suppressed"));
    }

    #[test]
    fn test_profiling_only_when_enabled() {
        let make = |profiling| {
            Engine::new(
                EngineSettings {
                    profiling,
                    ..EngineSettings::default()
                },
                vec![rule_set("s", vec![instance("s", "F", RuleCategory::Style, Box::new(FunctionRule))])],
            )
        };

        let result = make(false).run(&[tree(0)]);
        assert!(result.profile().is_empty());

        let result = make(true).run(&[tree(0), tree(1)]);
        let records = result.profile().records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.findings == 4 && r.rule == "F"));
    }

    #[test]
    fn test_seeded_notifications_come_first() {
        let mut engine = Engine::new(settings(false), vec![])
            .with_notifications(vec![Notification::warning("Property 'x' is misspelled or does not exist.")]);
        let result = engine.run(&[tree(0)]);
        assert_eq!(result.notifications().len(), 1);
        assert!(result.is_clean());
    }

    #[test]
    fn test_rule_set_path_filter() {
        let config = Config::from_yaml_str("excludes: ['**/file_1.kt']\n").unwrap();
        let set = RuleSet::new(
            "s",
            vec![instance("s", "F", RuleCategory::Style, Box::new(FunctionRule))],
            PathFilter::from_config(&config).unwrap(),
        );
        let mut engine = Engine::new(settings(false), vec![set]);
        let result = engine.run(&[tree(0), tree(1)]);

        assert!(result
            .findings()
            .iter()
            .all(|f| f.location().file_name() == "file_0.kt"));
        assert_eq!(result.findings().len(), 4);
    }
}
