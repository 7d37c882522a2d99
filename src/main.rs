//! ruleflow - Main Entry Point
//!
//! Loads the configuration, parses and compiles the rule files, then runs
//! every producer until all of them have finished.

use anyhow::{bail, Context, Result};
use clap::Parser;
use ruleflow::config::{EngineConfig, LogConfig, LOG_FILE_PREFIX};
use ruleflow::pipeline::{NodeRegistry, Orchestrator};
use ruleflow::rules::ImportResolver;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Run rule-driven event pipelines
#[derive(Parser, Debug)]
#[command(name = "ruleflow")]
#[command(version, about, long_about = None)]
struct Args {
    /// Engine configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Parse and compile the rules, print a summary and exit
    #[arg(long)]
    check: bool,

    /// Entry rule files, in addition to those listed in the config
    #[arg(value_name = "RULE_FILES")]
    rules: Vec<PathBuf>,
}

fn init_logging(log: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let (file_layer, guard) = match &log.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    guard
}

fn print_summary(orchestrator: &Orchestrator) {
    let ruleset = orchestrator.ruleset();
    println!(
        "{} rules ({} with producers), {} nodes",
        ruleset.len(),
        ruleset.root_rule_names().len(),
        ruleset.node_count()
    );
    for name in orchestrator.rule_names() {
        let Some(rule) = orchestrator.rule(name) else {
            continue;
        };
        println!(
            "  {:<24} {:?} -> {:?}  ({})",
            name,
            rule.first(),
            rule.last(),
            rule.file().display()
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let _log_guard = init_logging(&config.log);

    config.rules.extend(args.rules.iter().cloned());
    if config.rules.is_empty() {
        bail!("No rule files given (pass them as arguments or list them under `rules` in the config)");
    }

    tracing::info!("Loading {} entry rule files", config.rules.len());
    let files = ImportResolver::from_disk()
        .resolve_all(&config.rules)
        .context("Failed to load rule files")?;

    let orchestrator = Orchestrator::from_files(&files, config, NodeRegistry::with_builtins())
        .context("Failed to compile rules")?;

    if args.check {
        print_summary(&orchestrator);
        return Ok(());
    }

    if let Err(e) = orchestrator.start_feeders() {
        orchestrator.stop_feeders();
        orchestrator.wait_feeders();
        return Err(e).context("Failed to start producers");
    }
    orchestrator.wait_feeders();

    tracing::info!("All producers finished, shutting down");
    Ok(())
}
