//! `treeflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — check a workflow definition and print its task order.
//! - `predict`  — print the task tree predicted before anything runs.
//! - `run`      — drive a workflow to completion, firing the given triggers.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use engine::{EngineConfig, JsonSerializer, TaskSnapshot, TaskState, Workflow, WorkflowSpec};
use nodes::CallbackRegistry;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "treeflow",
    about = "Task-tree workflow runner with sub-workflow splicing",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Print the predicted task tree of a fresh workflow.
    Predict {
        path: PathBuf,
        /// Levels the prediction pass may speculate ahead.
        #[arg(long, default_value_t = 2)]
        lookahead: usize,
    },
    /// Run a workflow and print the final task tree as JSON.
    Run {
        path: PathBuf,
        /// Trigger every waiting task with this spec name once the
        /// workflow stalls. May be repeated.
        #[arg(long = "trigger", value_name = "NAME")]
        triggers: Vec<String>,
        #[arg(long, default_value_t = 2)]
        lookahead: usize,
        /// Record failed tasks and keep driving the rest.
        #[arg(long)]
        keep_going: bool,
    },
}

fn load(path: &Path) -> Result<WorkflowSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;

    let mut registry = CallbackRegistry::new();
    nodes::builtin::register_builtins(&mut registry)?;
    JsonSerializer::new(registry)
        .from_json(&content)
        .with_context(|| format!("invalid workflow definition {}", path.display()))
}

fn print_tree(snapshot: &TaskSnapshot) {
    for (depth, task) in snapshot.walk() {
        println!("{}{} [{}]", "  ".repeat(depth), task.name, task.state);
    }
}

fn run(spec: &WorkflowSpec, triggers: &[String], config: EngineConfig) -> Result<Workflow> {
    let mut workflow = Workflow::with_config(spec, config)?;
    workflow.complete_all()?;

    for name in triggers {
        let waiting: Vec<_> = workflow
            .tasks_named(name)
            .into_iter()
            .filter(|id| {
                workflow
                    .task(*id)
                    .map(|task| task.state().is_runnable())
                    .unwrap_or(false)
            })
            .collect();
        if waiting.is_empty() {
            warn!("no waiting task named '{}'", name);
        }
        for id in waiting {
            workflow.trigger(id)?;
        }
    }

    let report = workflow.complete_all()?;
    if !report.failed.is_empty() {
        warn!("{} task(s) failed", report.failed.len());
    }
    Ok(workflow)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let spec = load(&path)?;
            let order = spec.validate()?;
            let names = order
                .iter()
                .map(|id| spec.graph().node(*id).map(|node| node.name().to_owned()))
                .collect::<Result<Vec<_>, _>>()?;
            println!("✅ Workflow '{}' is valid. Task order: {names:?}", spec.name());
        }
        Command::Predict { path, lookahead } => {
            let spec = load(&path)?;
            let config = EngineConfig {
                lookahead,
                ..EngineConfig::default()
            };
            let workflow = Workflow::with_config(&spec, config)?;
            print_tree(&workflow.snapshot()?);
        }
        Command::Run {
            path,
            triggers,
            lookahead,
            keep_going,
        } => {
            let spec = load(&path)?;
            let config = EngineConfig {
                lookahead,
                abort_on_failure: !keep_going,
            };
            info!("Running workflow '{}'", spec.name());
            let workflow = run(&spec, &triggers, config)?;

            let snapshot = workflow.snapshot()?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);

            if !workflow.is_completed() {
                let open = workflow
                    .tasks()
                    .filter(|task| !task.state().is_finished())
                    .count();
                bail!("❌ workflow stalled with {open} unfinished task(s)");
            }
            if workflow.tasks().any(|task| task.state() == TaskState::Failed) {
                bail!("❌ workflow finished with failed tasks");
            }
        }
    }
    Ok(())
}
