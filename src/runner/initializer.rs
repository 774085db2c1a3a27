//! Initializer - Phase 1, turns the prompt file into a task list.
//!
//! The assistant plans only: it writes `tasks.json`, `progress.md` and
//! `init.sh` under the ralph directory and commits them. A run that leaves no
//! valid task list behind is fatal.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use colored::*;
use log::{info, warn};

use crate::assistant::{Assistant, AssistantRequest};
use crate::domain::TaskFile;
use crate::error::{RalphError, Result};
use crate::project::ProjectProfile;
use crate::prompt::PromptBuilder;
use crate::storage::RalphDir;

/// Characters of the rendered prompt shown in a dry run
const PREVIEW_CHARS: usize = 800;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub prompt_file: PathBuf,
    /// Replaces the detected tool allow-list
    pub tools: Option<String>,
    pub max_turns: u32,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    /// The assistant wrote a valid task list
    Initialized(TaskFile),
    /// Dry run: prompt previewed, nothing invoked
    DryRun,
}

/// Read the prompt file, failing with `PromptFileNotFound` when it is absent
pub fn read_prompt_file(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(RalphError::PromptFileNotFound(path.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}

/// Run Phase 1
pub async fn run_initializer<A>(
    assistant: &A,
    prompts: &PromptBuilder,
    dir: &RalphDir,
    project: &ProjectProfile,
    options: &InitOptions,
) -> Result<InitOutcome>
where
    A: Assistant + ?Sized,
{
    dir.ensure()?;

    let task_description = read_prompt_file(&options.prompt_file)?;
    let tools = options.tools.as_deref().unwrap_or(&project.tools);

    println!("  Project type:  {}", project.kind.label().cyan());
    println!("  Prompt file:   {}", options.prompt_file.display().to_string().cyan());
    println!("  Tools:         {}", tools.dimmed());
    println!();

    let prompt = prompts.initializer(&task_description, project.kind.label(), Utc::now())?;

    if options.dry_run {
        println!("{} Would invoke the assistant for initialization.", "DRY RUN".yellow());
        let preview: String = prompt.chars().take(PREVIEW_CHARS).collect();
        println!("{}\n{}", preview.dimmed(), "... (truncated)".dimmed());
        return Ok(InitOutcome::DryRun);
    }

    println!("{}", "Running initializer (this may take a moment)...".dimmed());
    info!("Invoking initializer for {}", options.prompt_file.display());

    let request = AssistantRequest::new(prompt, tools, options.max_turns);
    let log_text = match assistant.invoke(&request).await {
        Ok(text) => text,
        Err(e) if e.is_not_found() => return Err(e.into()),
        Err(e) => {
            warn!("Initializer invocation failed: {}", e);
            e.sentinel_text()
        }
    };
    dir.write_initializer_log(&log_text)?;

    let tasks = dir.load_tasks()?;
    print_task_summary(&tasks);
    Ok(InitOutcome::Initialized(tasks))
}

fn print_task_summary(tasks: &TaskFile) {
    println!();
    println!("{:<6} {:>8}  {}", "ID".bold(), "Priority".bold(), "Title".bold());
    for task in &tasks.features {
        println!("{:<6} {:>8}  {}", task.id.cyan(), task.priority, task.title);
    }
    println!();
    println!(
        "{} {} tasks for: {}",
        "Initialized".green(),
        tasks.features.len(),
        tasks.task.bold()
    );
}
