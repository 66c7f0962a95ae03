// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] provides `CommandWork`, an operation body that runs a shell
//!   command with `tokio::process::Command` and reports stdout-driven
//!   progress.
//! - [`plan`] turns a validated plan file into an `OperationSequence` of
//!   command operations.

pub mod command;
pub mod plan;

pub use command::CommandWork;
pub use plan::{PlanSequence, build_sequence};
