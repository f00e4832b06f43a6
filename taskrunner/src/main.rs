//! Declarative maintenance-task runner.
//!
//! Reads a Task document, applies its conditions, and runs its Sub-Tasks in
//! order. The exit code reflects the Task outcome.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use taskrunner::core::param::Parameter;
use taskrunner::core::store::ParameterStore;
use taskrunner::exit_codes;
use taskrunner::io::config::{DEFAULT_SETTINGS_FILE, load_settings};
use taskrunner::io::document::load_task;
use taskrunner::logging;
use taskrunner::orchestrator::{ExecutionContext, RunOptions, run_task};
use taskrunner::validate::validate_document;

#[derive(Parser)]
#[command(
    name = "taskrunner",
    version,
    about = "Run declaratively configured maintenance tasks"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Task described by a config document.
    Run {
        /// Task document (XML).
        config: PathBuf,
        /// Stop at the first failed Sub-Task.
        #[arg(long)]
        halt_on_error: bool,
        /// Narrate every control-flow decision.
        #[arg(long)]
        display: bool,
        /// Append execution records to this file.
        #[arg(long, value_name = "PATH")]
        log: Option<PathBuf>,
        /// Runner settings file.
        #[arg(long, value_name = "PATH", default_value = DEFAULT_SETTINGS_FILE)]
        settings: PathBuf,
        /// User parameter, `p:<type>:<name>:<value>` (repeatable).
        #[arg(short = 'p', long = "param", value_name = "TOKEN")]
        params: Vec<String>,
    },
    /// Parse a config document and check every condition.
    Validate {
        /// Task document (XML).
        config: PathBuf,
    },
}

struct RunArgs {
    config: PathBuf,
    halt_on_error: bool,
    display: bool,
    log: Option<PathBuf>,
    settings: PathBuf,
    params: Vec<String>,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run {
            config,
            halt_on_error,
            display,
            log,
            settings,
            params,
        } => cmd_run(RunArgs {
            config,
            halt_on_error,
            display,
            log,
            settings,
            params,
        }),
        Command::Validate { config } => cmd_validate(&config),
    };
    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let settings = load_settings(&args.settings)?;
    let options = RunOptions {
        halt_on_error: args.halt_on_error || settings.halt_on_error,
        display: args.display || settings.display,
        log_path: args
            .log
            .or_else(|| settings.log.enabled.then(|| settings.log.path.clone())),
    };
    debug!(?options, "run options resolved");

    let mut params = ParameterStore::new(settings.iteration_limits());
    for token in &args.params {
        let param =
            Parameter::parse(token).with_context(|| format!("parse parameter `{token}`"))?;
        if !params.register_user(param) {
            bail!("parameter `{token}` was rejected");
        }
    }

    let mut task = load_task(&args.config)?;
    let mut ctx = ExecutionContext::new(params, options);
    let report = run_task(&mut ctx, &mut task);
    println!(
        "{}: {} ({}), {} executed, {} succeeded, {} failed, {} skipped",
        task.name,
        report.outcome,
        report.stop.as_str(),
        report.executed,
        report.succeeded,
        report.failed,
        report.skipped
    );
    Ok(exit_codes::for_outcome(report.outcome))
}

fn cmd_validate(config: &Path) -> Result<i32> {
    let outcome = validate_document(config)?;
    if outcome.problems.is_empty() {
        println!("{}: {} sub-tasks, ok", outcome.task_name, outcome.subtasks);
        return Ok(exit_codes::OK);
    }
    for problem in &outcome.problems {
        eprintln!("{problem}");
    }
    Ok(exit_codes::INVALID)
}
