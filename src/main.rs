//! Frost CLI - Rule-Driven Static Analysis
//!
//! Analyzes serialized syntax trees produced by an external parser.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use frost::output::{JsonReporter, ProfileSummaryReporter, ProfilingReporter, Reporter, TextReporter};
use frost::{DiscoveryOptions, Error, ExitStatus, RuleRestriction, RunOptions, Runner, SyntaxTree};
use glob::glob;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "frost",
    version,
    about = "Rule-driven static analysis",
    long_about = "Runs built-in and plugin rule sets over serialized syntax trees, \
                  with inline suppressions, baselines and parallel execution."
)]
struct Cli {
    /// Tree files or glob patterns to analyze
    files: Vec<String>,

    /// Configuration file; repeat to layer several files
    #[arg(short, long)]
    config: Vec<PathBuf>,

    /// Baseline file of accepted findings
    #[arg(short, long)]
    baseline: Option<PathBuf>,

    /// Write the baseline from the current findings
    #[arg(long, requires = "baseline")]
    create_baseline: bool,

    /// Analyze files in parallel
    #[arg(long)]
    parallel: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Print the most expensive rules
    #[arg(long)]
    profile: bool,

    /// Run a single rule, e.g. complexity:LongMethod
    #[arg(long, value_name = "RULE_SET:RULE")]
    run_rule: Option<String>,

    /// Skip a rule set; may be repeated
    #[arg(long, value_name = "RULE_SET")]
    disable_rule_set: Vec<String>,

    /// Skip every built-in rule set
    #[arg(long)]
    disable_default_rule_sets: bool,

    /// Directory holding rule set manifests; may be repeated
    #[arg(long)]
    plugins_dir: Vec<PathBuf>,

    /// Activate every rule regardless of configuration
    #[arg(long)]
    all_rules: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,

    /// Write per rule and file timings as CSV
    #[arg(long, value_name = "PATH")]
    report_profile: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl Cli {
    fn run_options(&self) -> Result<RunOptions, Error> {
        let mut options = RunOptions::new();
        for path in &self.config {
            options = options.with_config(path);
        }
        if let Some(baseline) = &self.baseline {
            options = options.with_baseline(baseline);
        }
        if self.create_baseline {
            options = options.creating_baseline();
        }
        for dir in &self.plugins_dir {
            options = options.with_plugin_dir(dir);
        }

        if self.parallel {
            options = options.with_override(&["engine", "parallel"], true);
        }
        if let Some(jobs) = self.jobs {
            options = options.with_override(&["engine", "jobs"], jobs as u64);
        }
        if self.profile || self.report_profile.is_some() {
            options = options.with_override(&["engine", "profiling"], true);
        }
        if self.all_rules {
            options = options.with_override(&["engine", "all_rules"], true);
        }

        let mut discovery = DiscoveryOptions::default();
        for id in &self.disable_rule_set {
            discovery = discovery.disable(id);
        }
        if self.disable_default_rule_sets {
            discovery = discovery.without_defaults();
        }
        options = options.with_discovery(discovery);

        if let Some(rule) = &self.run_rule {
            options = options.with_restriction(rule.parse::<RuleRestriction>()?);
        }
        Ok(options)
    }
}

/// Expand glob patterns into tree files
fn collect_files(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let paths = glob(pattern).with_context(|| format!("Invalid pattern '{}'", pattern))?;
        files.extend(paths.flatten().filter(|p| p.is_file()));
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn run(cli: &Cli) -> anyhow::Result<ExitStatus> {
    let files = collect_files(&cli.files)?;
    if files.is_empty() {
        anyhow::bail!("No files found to analyze");
    }

    let trees = files
        .iter()
        .map(|path| SyntaxTree::load(path).with_context(|| format!("Failed to load {}", path.display())))
        .collect::<anyhow::Result<Vec<_>>>()?;
    log::info!("Loaded {} trees", trees.len());

    let outcome = Runner::new(cli.run_options()?).run(&trees)?;

    let reporter: Box<dyn Reporter> = match cli.format {
        Format::Text => {
            let text = TextReporter::new();
            Box::new(if cli.no_color { text.without_color() } else { text })
        }
        Format::Json => Box::new(JsonReporter::new().pretty()),
    };
    if let Some(report) = reporter.render(&outcome.result) {
        print!("{}", report);
        if !report.ends_with('\n') {
            println!();
        }
    }

    if cli.profile {
        if let Some(summary) = ProfileSummaryReporter::default().render(&outcome.result) {
            eprint!("{}", summary);
        }
    }
    if let Some(path) = &cli.report_profile {
        let csv = ProfilingReporter.render(&outcome.result).unwrap_or_default();
        std::fs::write(path, csv)
            .with_context(|| format!("Failed to write profile to {}", path.display()))?;
    }

    Ok(outcome.status)
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    // Handle --no-color
    if cli.no_color {
        colored::control::set_override(false);
    }

    let status = match run(&cli) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            match e.downcast_ref::<Error>() {
                Some(error) => {
                    if let Error::InvalidConfig(problems) = error {
                        for problem in problems {
                            eprintln!("  {}", problem);
                        }
                    }
                    error.exit_status()
                }
                None => ExitStatus::UnexpectedError,
            }
        }
    };

    std::process::exit(status.code());
}
