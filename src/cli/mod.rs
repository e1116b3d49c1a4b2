//! Command-line interface for the osac provisioning tool.
//!
//! Argument parsing lives in `commands`, presentation in `output`; the
//! binary wires both to the planner and the state store.

mod commands;
mod output;

pub use commands::{
    Cli, Commands, GetTarget, KindArg, OutputFormat, ResourceArg, StateCommands,
};
pub use output::OutputFormatter;
