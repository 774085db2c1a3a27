use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ralph::assistant::{ClaudeCli, locate_binary};
use ralph::domain::{TaskFile, TaskStatus};
use ralph::project::{self, ProjectProfile};
use ralph::prompt::PromptBuilder;
use ralph::runner::rate_limit::now_epoch;
use ralph::runner::{
    InitOptions, InitOutcome, LoopController, LoopOptions, LoopOutcome, RateLimiter, read_prompt_file, run_initializer,
};
use ralph::storage::RalphDir;
use ralph::workspace::GitWorkspace;
use ralph::RalphError;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, PhaseArgs};
use config::Config;

fn setup_logging(default_level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ralph")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ralph.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            phase,
            skip_init,
            max_iter,
            sleep_between,
            rate_limit,
            no_git,
        } => {
            let options = loop_options(config, phase, *max_iter, *sleep_between, *rate_limit, *no_git);
            handle_run_command(phase, *skip_init, options, config).await
        }
        Commands::Init { phase } => handle_init_command(phase, config).await,
        Commands::Status => handle_status_command(config),
        Commands::Stop => handle_stop_command(config),
        Commands::Reset => handle_reset_command(config),
    }
}

/// Flags win over environment, which wins over the config file
fn loop_options(
    config: &Config,
    phase: &PhaseArgs,
    max_iter: Option<u32>,
    sleep_between: Option<u64>,
    rate_limit: Option<u32>,
    no_git: bool,
) -> LoopOptions {
    LoopOptions {
        max_iterations: max_iter.unwrap_or(config.loop_.max_iterations),
        max_turns: phase.max_turns.unwrap_or(config.assistant.max_turns),
        sleep_between: Duration::from_secs(sleep_between.unwrap_or(config.loop_.sleep_between_secs)),
        rate_limit_per_hour: rate_limit.unwrap_or(config.loop_.rate_limit_per_hour),
        // Filled in after project detection
        tools: String::new(),
        verify_command: None,
        git_commit: config.loop_.git_commit && !no_git,
        dry_run: phase.dry_run,
        circuit: config.circuit.breaker(),
    }
}

/// Everything both phases need, checked before any work starts
struct Preflight {
    task_description: String,
    profile: ProjectProfile,
    tools: String,
    dir: RalphDir,
    prompts: PromptBuilder,
    assistant: Arc<ClaudeCli>,
    max_turns: u32,
}

fn preflight(phase: &PhaseArgs, config: &Config) -> Result<Preflight> {
    let task_description = match read_prompt_file(&phase.prompt_file) {
        Ok(text) => text,
        Err(e @ RalphError::PromptFileNotFound(_)) => {
            println!("{} {}", "ERROR".red(), e);
            println!();
            println!("Create one first, e.g.:");
            println!("  {}", "mkdir -p prompts".dimmed());
            println!("  {}", "cat > prompts/PROMPT.md".dimmed());
            return Err(e.into());
        }
        Err(e) => return Err(e).context("Failed to read prompt file"),
    };

    let binary = &config.assistant.binary;
    if !phase.dry_run {
        match locate_binary(binary) {
            Ok(path) => info!("Using assistant binary {}", path.display()),
            Err(e) => {
                println!("{} {}", "ERROR".red(), e);
                return Err(e.into());
            }
        }
    }

    let profile = project::detect(Path::new("."));
    let tools = phase
        .tools
        .clone()
        .or_else(|| config.assistant.tools.clone())
        .unwrap_or_else(|| profile.tools.clone());

    let prompts = match &config.prompts_dir {
        Some(prompts_dir) => PromptBuilder::with_overrides(&config.ralph_dir, prompts_dir)?,
        None => PromptBuilder::new(&config.ralph_dir)?,
    };

    let assistant = ClaudeCli::new(binary.clone(), config.assistant.timeout())
        .skip_permissions(phase.dangerously_skip_permissions || config.assistant.skip_permissions);

    Ok(Preflight {
        task_description,
        profile,
        tools,
        dir: RalphDir::new(&config.ralph_dir),
        prompts,
        assistant: Arc::new(assistant),
        max_turns: phase.max_turns.unwrap_or(config.assistant.max_turns),
    })
}

fn print_banner(phase: &PhaseArgs, config: &Config, max_iter: Option<u32>, max_turns: u32) {
    println!("{} Autonomous Task Runner", "RALPH LOOP".bold().blue());
    println!();
    println!("  {} {}", "Prompt:   ".dimmed(), phase.prompt_file.display());
    println!("  {} {}", "Ralph dir:".dimmed(), config.ralph_dir.display());
    if let Some(max_iter) = max_iter {
        println!("  {} {}", "Max iter: ".dimmed(), max_iter);
    }
    println!("  {} {} per invocation", "Max turns:".dimmed(), max_turns);
    if phase.dry_run {
        println!("  {}", "DRY RUN: the assistant will not be invoked".yellow());
    }
    println!();
}

async fn run_phase_one(pre: &Preflight, phase: &PhaseArgs) -> Result<()> {
    println!("{}", "Phase 1: Initializer".bold().blue());
    let options = InitOptions {
        prompt_file: phase.prompt_file.clone(),
        tools: Some(pre.tools.clone()),
        max_turns: pre.max_turns,
        dry_run: phase.dry_run,
    };

    match run_initializer(pre.assistant.as_ref(), &pre.prompts, &pre.dir, &pre.profile, &options).await {
        Ok(InitOutcome::Initialized(tasks)) => {
            info!("Initializer created {} tasks", tasks.features.len());
            Ok(())
        }
        Ok(InitOutcome::DryRun) => Ok(()),
        Err(e @ (RalphError::TaskFileMissing(_) | RalphError::InvalidTaskFile { .. })) => {
            println!(
                "{} {}. Check {} for details.",
                "ERROR".red(),
                e,
                pre.dir.initializer_log_path().display()
            );
            Err(e.into())
        }
        Err(e) => Err(e).context("Initializer failed"),
    }
}

async fn handle_run_command(phase: &PhaseArgs, skip_init: bool, mut options: LoopOptions, config: &Config) -> Result<()> {
    let pre = preflight(phase, config)?;
    print_banner(phase, config, Some(options.max_iterations), pre.max_turns);

    if !skip_init {
        run_phase_one(&pre, phase).await?;
    }

    println!("{}", "Phase 2: Coder Loop".bold().blue());
    options.tools = pre.tools.clone();
    options.max_turns = pre.max_turns;
    options.verify_command = pre.profile.verify_command.clone();

    println!("  Max iterations: {}", options.max_iterations.to_string().cyan());
    println!("  Max turns:      {}", options.max_turns.to_string().cyan());
    println!("  Rate limit:     {}/hr", options.rate_limit_per_hour.to_string().cyan());
    println!("  Project type:   {}", pre.profile.kind.label().cyan());
    println!(
        "  Verify cmd:     {}",
        options.verify_command.as_deref().unwrap_or("none").cyan()
    );
    println!();

    let max_iterations = options.max_iterations;
    let controller = LoopController::new(
        pre.assistant.clone(),
        Arc::new(GitWorkspace::new(".")),
        pre.prompts,
        pre.dir.clone(),
        pre.task_description,
        options,
    );

    let outcome = controller.run().await.context("Coder loop failed")?;
    info!("Coder loop finished: {:?}", outcome);

    println!();
    match outcome {
        LoopOutcome::Completed { iteration } => {
            println!("{} after {} iteration(s)", "TASK COMPLETE".green().bold(), iteration);
        }
        LoopOutcome::Stopped => {
            println!("{}", "Loop stopped by request.".yellow());
        }
        LoopOutcome::CircuitOpen(reason) => {
            println!("{} {}", "CIRCUIT OPEN".red().bold(), reason);
            println!("Inspect {} then run `ralph reset` to continue.", pre.dir.logs_dir().display());
        }
        LoopOutcome::BudgetExhausted => {
            println!("{}", format!("MAX ITERATIONS REACHED ({})", max_iterations).yellow());
            println!("Check {} for progress.", pre.dir.root().display());
            println!("Re-run with {} to continue.", "--skip-init".dimmed());
        }
        LoopOutcome::DryRun => {
            println!("{}", "Dry run finished.".yellow());
        }
    }
    Ok(())
}

async fn handle_init_command(phase: &PhaseArgs, config: &Config) -> Result<()> {
    let pre = preflight(phase, config)?;
    print_banner(phase, config, None, pre.max_turns);
    run_phase_one(&pre, phase).await
}

fn handle_status_command(config: &Config) -> Result<()> {
    let dir = RalphDir::new(&config.ralph_dir);
    info!("Showing status for {}", dir.root().display());

    if !dir.root().exists() {
        println!("No ralph directory at {}", dir.root().display());
        return Ok(());
    }

    let state = dir.load_state();
    let mut recent_calls = state.call_timestamps.clone();
    RateLimiter::default().prune(&mut recent_calls, now_epoch());

    let circuit = if state.circuit_state.is_open() {
        state.circuit_state.to_string().red()
    } else {
        state.circuit_state.to_string().green()
    };

    println!("{} {}", "Status for:".green(), dir.root().display());
    println!("  Iterations:          {}", state.iterations);
    println!("  Circuit:             {}", circuit);
    println!("  No-progress streak:  {}", state.consecutive_no_progress);
    println!("  Same-error count:    {}", state.same_error_count);
    if !state.last_error.is_empty() {
        println!("  Last error:          {}", state.last_error.red());
    }
    println!("  Calls in last hour:  {}", recent_calls.len());
    if dir.stop_path().exists() {
        println!("  {}", "Stop requested".yellow());
    }
    if let Some(status) = dir.read_status() {
        println!("  STATUS:              {}", status.lines().collect::<Vec<_>>().join(" | "));
    }
    println!();

    match dir.load_tasks() {
        Ok(tasks) => print_tasks(&tasks),
        Err(RalphError::TaskFileMissing(_)) => println!("No task list yet. Run `ralph init` first."),
        Err(e) => println!("{} {}", "ERROR".red(), e),
    }
    Ok(())
}

fn print_tasks(tasks: &TaskFile) {
    println!("{} {}", "Task:".bold(), tasks.task);
    println!("{:<6} {:>8}  {:<12} {}", "ID", "Priority", "Status", "Title");
    for task in &tasks.features {
        let status = match &task.status {
            TaskStatus::Pending => task.status.as_str().dimmed(),
            TaskStatus::InProgress => task.status.as_str().yellow(),
            TaskStatus::Complete => task.status.as_str().green(),
            TaskStatus::Failed => task.status.as_str().red(),
            TaskStatus::Other(s) => s.as_str().normal(),
        };
        println!("{:<6} {:>8}  {:<12} {}", task.id, task.priority, status, task.title);
    }
    println!();
    println!(
        "{} complete, {} in progress, {} pending, {} failed",
        tasks.count(&TaskStatus::Complete),
        tasks.count(&TaskStatus::InProgress),
        tasks.pending_count(),
        tasks.count(&TaskStatus::Failed)
    );
    if let Some(next) = tasks.next_pending() {
        println!("Next up: {} {}", next.id, next.title);
    }
}

fn handle_stop_command(config: &Config) -> Result<()> {
    let dir = RalphDir::new(&config.ralph_dir);
    dir.request_stop().context("Failed to write STOP file")?;
    info!("Stop requested via {}", dir.stop_path().display());
    println!("{} {}", "Stop requested:".yellow(), dir.stop_path().display());
    Ok(())
}

fn handle_reset_command(config: &Config) -> Result<()> {
    let dir = RalphDir::new(&config.ralph_dir);
    if dir.reset_state().context("Failed to reset loop state")? {
        info!("Removed {}", dir.state_path().display());
        println!("{} {}", "Reset:".green(), dir.state_path().display());
    } else {
        println!("No loop state to reset.");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = if cli.is_verbose() {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    setup_logging(level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
