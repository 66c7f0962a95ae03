// src/lib.rs

//! `opgraph`: operations with a lifecycle, composed into sequences that run
//! along a dependency graph.
//!
//! - [`dag`]: generic directed graph, dependency graph and partitioning.
//! - [`operation`]: the `Operation` handle and its run engine.
//! - [`sequence`]: `OperationSequence`, a composite operation over a graph.
//! - [`config`] + [`exec`]: TOML plan files of shell commands.
//! - [`cli`] + [`logging`]: the `opgraph` binary's surface.

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod operation;
pub mod sequence;
pub mod types;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::PlanFile;
use crate::exec::plan::{PlanSequence, build_sequence};
use crate::operation::pool::worker_pool;

pub use crate::errors::{OperationError, OpgraphError};
pub use crate::operation::{ExecutionResult, Operation, RunContext, Work};
pub use crate::sequence::OperationSequence;
pub use crate::types::{DispatchMode, ErrorBehavior, OperationState, SchedulingMode};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and validation
/// - sequence construction (optionally restricted to one operation)
/// - Ctrl-C handling
/// - the run itself and its final report
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let plan = load_and_validate(&config_path)
        .with_context(|| format!("loading plan from '{}'", config_path.display()))?;

    let built = build_sequence(&plan)?;
    if let Some(target) = &args.operation {
        built.restrict_to(target)?;
    }

    if args.dry_run {
        print_dry_run(&plan, &built)?;
        return Ok(());
    }

    install_ctrl_c(&built.sequence)?;

    let sequence = &built.sequence;
    sequence.run();
    sequence.wait();

    for record in sequence.detail_progress() {
        info!(
            operation = %record.name,
            progress = record.progress,
            completed = record.is_completed,
            aborted = record.is_aborted,
            "operation summary"
        );
    }

    let result = sequence.execution_result();
    if result.is_cancelled() {
        warn!(sequence = %sequence.name(), "sequence was cancelled");
    }
    if let Some(err) = result.error() {
        bail!("sequence '{}' failed: {}", sequence.name(), err);
    }

    info!(sequence = %sequence.name(), "all operations completed");
    Ok(())
}

/// Ctrl-C → cancel the sequence. Runs on the shared worker pool because the
/// sequence itself runs on the calling thread.
fn install_ctrl_c(sequence: &OperationSequence) -> Result<()> {
    let pool = worker_pool()?;
    let sequence = sequence.clone();
    pool.spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Ctrl-C received; cancelling sequence");
        let _ = tokio::task::spawn_blocking(move || sequence.cancel()).await;
    });
    Ok(())
}

/// Simple dry-run output: print the plan and the partitions a run would
/// execute, in order.
fn print_dry_run(plan: &PlanFile, built: &PlanSequence) -> Result<()> {
    let partitions = built.sequence.partitions()?;

    println!("opgraph dry-run");
    println!("  sequence.name = {}", plan.sequence.name);
    println!("  sequence.scheduling = {:?}", plan.sequence.scheduling);
    println!("  sequence.error_behavior = {:?}", plan.sequence.error_behavior);
    println!("  sequence.dispatch = {:?}", plan.sequence.dispatch);
    println!();

    println!("operations ({}):", plan.operation.len());
    for (name, op) in plan.operation.iter() {
        println!("  - {name}");
        println!("      cmd: {}", op.cmd);
        if !op.after.is_empty() {
            println!("      after: {:?}", op.after);
        }
        if let Some(dispatch) = op.dispatch {
            println!("      dispatch: {dispatch:?}");
        }
        if let Some(ref s) = op.progress_pattern {
            println!("      progress_pattern: {s}");
        }
    }
    println!();

    println!("partitions ({}):", partitions.len());
    for partition in partitions.iter() {
        let mut names: Vec<&str> = partition.iter().map(Operation::name).collect();
        names.sort_unstable();
        println!("  {}: {}", partition.level(), names.join(", "));
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
