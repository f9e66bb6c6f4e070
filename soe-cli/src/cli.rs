//! ABOUTME: clap argument parsing, grounded on llmspell-cli::cli's subcommand layout
//! ABOUTME: Scoped to the three operations spec.md §5.7 names: run, resume, inspect

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for the signal-driven orchestration engine.
#[derive(Parser, Debug)]
#[command(name = "soe")]
#[command(version)]
#[command(about = "Run and inspect signal-driven orchestration workflows")]
pub struct Cli {
    /// Increase log verbosity (-v, -vv); overridden by RUST_LOG if set.
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a fresh execution from a workflow document and run it to quiescence.
    Run {
        /// Path to a workflow YAML document (spec.md §6.5).
        workflow: PathBuf,

        /// Name of the workflow within the document to start from.
        #[arg(long)]
        initial_workflow: String,

        /// Signal to seed the dispatch queue with; repeatable.
        #[arg(long = "signal")]
        signals: Vec<String>,

        /// Context field to print after the run completes; repeatable.
        #[arg(long = "show-field")]
        show_fields: Vec<String>,

        /// Directory to persist the execution under. Without this, the
        /// execution lives only in memory and cannot be resumed.
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Re-enter a previously persisted execution with new signals.
    Resume {
        /// Execution id printed by a prior `run` or `resume`.
        execution_id: String,

        /// Signal to dispatch; repeatable.
        #[arg(long = "signal")]
        signals: Vec<String>,

        /// Directory the execution was persisted under.
        #[arg(long)]
        store: PathBuf,
    },
    /// Print a persisted execution's context as JSON.
    Inspect {
        /// Execution id printed by a prior `run` or `resume`.
        execution_id: String,

        /// Directory the execution was persisted under.
        #[arg(long)]
        store: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_parses_repeated_signals_and_show_fields() {
        let cli = Cli::try_parse_from([
            "soe",
            "run",
            "workflow.yaml",
            "--initial-workflow",
            "main",
            "--signal",
            "START",
            "--signal",
            "RETRY",
            "--show-field",
            "result",
        ])
        .unwrap();
        let Commands::Run {
            signals,
            show_fields,
            store,
            ..
        } = cli.command
        else {
            panic!("expected Run");
        };
        assert_eq!(signals, vec!["START", "RETRY"]);
        assert_eq!(show_fields, vec!["result"]);
        assert!(store.is_none());
    }

    #[test]
    fn resume_requires_store() {
        let err = Cli::try_parse_from(["soe", "resume", "some-id", "--signal", "X"]).unwrap_err();
        assert!(err.to_string().contains("store"));
    }

    #[test]
    fn verbose_count_accumulates() {
        let cli = Cli::try_parse_from(["soe", "-vv", "inspect", "id", "--store", "dir"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
