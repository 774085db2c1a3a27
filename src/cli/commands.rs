//! CLI command definitions using clap.
//!
//! - run: initializer then coder loop
//! - init: initializer only
//! - status: loop state and task table
//! - stop: ask a running loop to halt
//! - reset: delete persisted loop state

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Ralph - autonomous multi-iteration task runner for a coding assistant
#[derive(Parser, Debug)]
#[command(
    name = "ralph",
    about = "Autonomous multi-iteration task runner for Claude Code",
    version = env!("GIT_DESCRIBE"),
    after_help = "Logs are written to: ~/.local/share/ralph/logs/ralph.log"
)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Options shared by both phases
#[derive(Args, Debug, Clone)]
pub struct PhaseArgs {
    /// Task prompt file
    #[arg(value_name = "PROMPT_FILE", default_value = "prompts/PROMPT.md")]
    pub prompt_file: PathBuf,

    /// Max turns per assistant invocation
    #[arg(long, env = "RALPH_MAX_TURNS")]
    pub max_turns: Option<u32>,

    /// Override allowedTools (comma-separated)
    #[arg(long, env = "RALPH_TOOLS")]
    pub tools: Option<String>,

    /// Pass --dangerously-skip-permissions to the assistant
    #[arg(long)]
    pub dangerously_skip_permissions: bool,

    /// Show what would happen without invoking the assistant
    #[arg(long)]
    pub dry_run: bool,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the initializer, then the coder loop
    Run {
        #[command(flatten)]
        phase: PhaseArgs,

        /// Skip the initializer and use the existing tasks.json
        #[arg(long)]
        skip_init: bool,

        /// Max coder iterations
        #[arg(short = 'n', long = "max-iter", env = "RALPH_MAX_ITER")]
        max_iter: Option<u32>,

        /// Seconds to sleep between coder iterations
        #[arg(long, env = "RALPH_SLEEP")]
        sleep_between: Option<u64>,

        /// Max assistant calls per hour
        #[arg(long, env = "RALPH_RATE_LIMIT", value_parser = clap::value_parser!(u32).range(1..))]
        rate_limit: Option<u32>,

        /// Disable the git commit after each iteration
        #[arg(long)]
        no_git: bool,
    },

    /// Run the initializer only
    Init {
        #[command(flatten)]
        phase: PhaseArgs,
    },

    /// Show loop state and the task list
    Status,

    /// Ask a running loop to halt before its next iteration
    Stop,

    /// Delete persisted loop state, closing the circuit
    Reset,
}
