//! Loop controller - Phase 2, one pending task per iteration.
//!
//! Each iteration starts the assistant with a fresh context built from the
//! files in the ralph directory. Between iterations the controller only keeps
//! its counters, which live in `state.json` so a later run resumes where this
//! one stopped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use colored::*;
use log::{debug, info, warn};

use crate::assistant::{Assistant, AssistantRequest};
use crate::domain::LoopState;
use crate::error::Result;
use crate::prompt::PromptBuilder;
use crate::storage::RalphDir;
use crate::workspace::Workspace;

use super::circuit::{CircuitBreaker, TripReason};
use super::exit;
use super::rate_limit::{RateLimiter, now_epoch};

/// How a run of the coder loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// Exit signal written and no pending tasks remain
    Completed { iteration: u32 },
    /// A STOP file was found and consumed
    Stopped,
    /// The circuit breaker halted the loop
    CircuitOpen(TripReason),
    /// Ran the configured number of iterations without finishing
    BudgetExhausted,
    /// Dry run previewed one iteration
    DryRun,
}

/// Knobs for one run of the coder loop
#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// Iterations to run in this invocation, counted from the persisted total
    pub max_iterations: u32,
    pub max_turns: u32,
    pub sleep_between: Duration,
    pub rate_limit_per_hour: u32,
    /// `--allowedTools` value
    pub tools: String,
    pub verify_command: Option<String>,
    /// Commit after every successful iteration
    pub git_commit: bool,
    pub dry_run: bool,
    pub circuit: CircuitBreaker,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            max_turns: 30,
            sleep_between: Duration::from_secs(2),
            rate_limit_per_hour: 40,
            tools: crate::project::base_tools(),
            verify_command: None,
            git_commit: true,
            dry_run: false,
            circuit: CircuitBreaker::default(),
        }
    }
}

/// Drives the coder loop against an assistant and a workspace
pub struct LoopController<A, W>
where
    A: Assistant,
    W: Workspace,
{
    assistant: Arc<A>,
    workspace: Arc<W>,
    prompts: PromptBuilder,
    dir: RalphDir,
    task_description: String,
    options: LoopOptions,
}

impl<A, W> LoopController<A, W>
where
    A: Assistant,
    W: Workspace,
{
    pub fn new(
        assistant: Arc<A>,
        workspace: Arc<W>,
        prompts: PromptBuilder,
        dir: RalphDir,
        task_description: impl Into<String>,
        options: LoopOptions,
    ) -> Self {
        Self {
            assistant,
            workspace,
            prompts,
            dir,
            task_description: task_description.into(),
            options,
        }
    }

    /// Run iterations until completion, a stop request, an open circuit or
    /// the iteration budget runs out.
    pub async fn run(&self) -> Result<LoopOutcome> {
        self.dir.ensure()?;
        let mut state = self.dir.load_state();
        let limiter = RateLimiter::new(self.options.rate_limit_per_hour);
        let breaker = self.options.circuit;

        let first = state.iterations.saturating_add(1);
        let last = state.iterations.saturating_add(self.options.max_iterations);
        let started = Instant::now();

        info!(
            "Coder loop starting at iteration {} (budget {}, circuit {})",
            first, self.options.max_iterations, state.circuit_state
        );

        for iteration in first..=last {
            if self.dir.take_stop_request()? {
                println!("{}", "STOP file detected, halting loop.".yellow());
                info!("Stop request consumed before iteration {}", iteration);
                return Ok(LoopOutcome::Stopped);
            }

            if let Some(reason) = breaker.check(&state) {
                warn!("Circuit open before iteration {}: {}", iteration, reason);
                state.trip();
                self.dir.save_state(&state)?;
                return Ok(LoopOutcome::CircuitOpen(reason));
            }

            if !self.options.dry_run {
                self.wait_for_rate_limit(&limiter, &mut state).await;
            }

            println!(
                "{} elapsed: {}s | circuit: {} | no-progress streak: {}",
                format!("[{}/{}]", iteration, last).bold().blue(),
                started.elapsed().as_secs(),
                state.circuit_state,
                state.consecutive_no_progress
            );

            let prompt = self.prompts.coder(
                &self.task_description,
                &self.dir.read_tasks_raw(),
                &self.dir.read_progress(),
                self.options.verify_command.as_deref(),
                Utc::now(),
            )?;

            if self.options.dry_run {
                println!(
                    "  {} Would invoke the assistant (iteration {}, {} prompt chars)",
                    "DRY RUN".yellow(),
                    iteration,
                    prompt.len()
                );
                state.iterations = iteration;
                self.dir.save_state(&state)?;
                return Ok(LoopOutcome::DryRun);
            }

            let request = AssistantRequest::new(prompt, self.options.tools.as_str(), self.options.max_turns);
            let (log_text, error) = match self.assistant.invoke(&request).await {
                Ok(text) => (text, None),
                Err(e) => {
                    let sentinel = e.sentinel_text();
                    (sentinel.clone(), Some(sentinel))
                }
            };
            self.dir.write_iteration_log(iteration, &log_text)?;

            state.iterations = iteration;
            state.record_error(error.as_deref());
            if let Some(sentinel) = &error {
                warn!("Iteration {} failed: {}", iteration, sentinel);
                println!("  {} {}", "error:".red(), preview(sentinel, 120));
            }

            let made_progress = self.workspace.has_progress().await;
            state.record_progress(made_progress);
            if !made_progress {
                println!(
                    "  {} (streak: {}/{})",
                    "no progress".yellow(),
                    state.consecutive_no_progress,
                    breaker.no_progress_threshold
                );
            }

            self.dir.save_state(&state)?;
            debug!("State after iteration {}: {:?}", iteration, state);

            if self.options.git_commit && error.is_none() {
                let message = format!("chore(ralph): end of iteration {}", iteration);
                if self.workspace.commit_all(&message).await {
                    println!("  {} {}", "committed".green(), message);
                }
            }

            if exit::is_complete(&self.dir) {
                info!("Task complete after iteration {}", iteration);
                return Ok(LoopOutcome::Completed { iteration });
            }

            if iteration < last && !self.options.sleep_between.is_zero() {
                tokio::time::sleep(self.options.sleep_between).await;
            }
        }

        info!("Iteration budget of {} exhausted", self.options.max_iterations);
        Ok(LoopOutcome::BudgetExhausted)
    }

    async fn wait_for_rate_limit(&self, limiter: &RateLimiter, state: &mut LoopState) {
        if let Some(wait) = limiter.wait_needed(&mut state.call_timestamps, now_epoch()) {
            println!(
                "{} {}/{} calls/hr. Waiting {}s...",
                "RATE LIMIT".yellow(),
                state.call_timestamps.len(),
                limiter.limit(),
                wait.as_secs()
            );
            info!("Rate limit reached, sleeping {:?}", wait);
            tokio::time::sleep(wait).await;
        }
        limiter.record(&mut state.call_timestamps, now_epoch());
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{AssistantError, ScriptedAssistant};
    use crate::domain::CircuitState;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Workspace with a fixed progress answer that counts commits
    struct FixedWorkspace {
        progress: bool,
        commits: AtomicUsize,
    }

    impl FixedWorkspace {
        fn new(progress: bool) -> Arc<Self> {
            Arc::new(Self {
                progress,
                commits: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Workspace for FixedWorkspace {
        async fn has_progress(&self) -> bool {
            self.progress
        }

        async fn commit_all(&self, _message: &str) -> bool {
            self.commits.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn options(max_iterations: u32) -> LoopOptions {
        LoopOptions {
            max_iterations,
            sleep_between: Duration::ZERO,
            ..Default::default()
        }
    }

    fn controller<W: Workspace>(
        temp: &Path,
        assistant: &Arc<ScriptedAssistant>,
        workspace: &Arc<W>,
        options: LoopOptions,
    ) -> LoopController<ScriptedAssistant, W> {
        let dir = RalphDir::new(temp.join(".ralph"));
        let prompts = PromptBuilder::new(dir.root()).unwrap();
        LoopController::new(
            assistant.clone(),
            workspace.clone(),
            prompts,
            dir,
            "Build a todo app",
            options,
        )
    }

    #[tokio::test]
    async fn test_budget_exhausted_with_progress() {
        let temp = TempDir::new().unwrap();
        let assistant = Arc::new(ScriptedAssistant::new());
        let workspace = FixedWorkspace::new(true);

        let outcome = controller(temp.path(), &assistant, &workspace, options(2))
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::BudgetExhausted);
        assert_eq!(assistant.calls(), 2);
        assert_eq!(workspace.commits.load(Ordering::SeqCst), 2);

        let state = RalphDir::new(temp.path().join(".ralph")).load_state();
        assert_eq!(state.iterations, 2);
        assert_eq!(state.call_timestamps.len(), 2);
    }

    #[tokio::test]
    async fn test_no_progress_opens_circuit_before_fourth_call() {
        let temp = TempDir::new().unwrap();
        let assistant = Arc::new(ScriptedAssistant::new());
        let workspace = FixedWorkspace::new(false);

        let outcome = controller(temp.path(), &assistant, &workspace, options(10))
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::CircuitOpen(TripReason::NoProgress(3)));
        assert_eq!(assistant.calls(), 3);
        let state = RalphDir::new(temp.path().join(".ralph")).load_state();
        assert_eq!(state.circuit_state, CircuitState::Open);
        assert_eq!(state.iterations, 3);
    }

    #[tokio::test]
    async fn test_errors_skip_commit_and_are_logged() {
        let temp = TempDir::new().unwrap();
        let assistant = Arc::new(
            ScriptedAssistant::new().otherwise(|| Err(AssistantError::Timeout(Duration::from_secs(3600)))),
        );
        let workspace = FixedWorkspace::new(true);

        controller(temp.path(), &assistant, &workspace, options(2))
            .run()
            .await
            .unwrap();

        let dir = RalphDir::new(temp.path().join(".ralph"));
        assert_eq!(workspace.commits.load(Ordering::SeqCst), 0);
        assert_eq!(
            fs::read_to_string(dir.iteration_log_path(1)).unwrap(),
            "ERROR: claude invocation timed out after 3600s"
        );
        let state = dir.load_state();
        assert_eq!(state.same_error_count, 2);
        assert_eq!(state.last_error, "ERROR: claude invocation timed out after 3600s");
    }

    #[tokio::test]
    async fn test_git_commit_disabled() {
        let temp = TempDir::new().unwrap();
        let assistant = Arc::new(ScriptedAssistant::new());
        let workspace = FixedWorkspace::new(true);
        let opts = LoopOptions {
            git_commit: false,
            ..options(1)
        };

        controller(temp.path(), &assistant, &workspace, opts).run().await.unwrap();
        assert_eq!(workspace.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dry_run_records_iteration_without_invoking() {
        let temp = TempDir::new().unwrap();
        let assistant = Arc::new(ScriptedAssistant::new());
        let workspace = FixedWorkspace::new(true);
        let opts = LoopOptions {
            dry_run: true,
            ..options(5)
        };

        let outcome = controller(temp.path(), &assistant, &workspace, opts).run().await.unwrap();

        assert_eq!(outcome, LoopOutcome::DryRun);
        assert_eq!(assistant.calls(), 0);
        let state = RalphDir::new(temp.path().join(".ralph")).load_state();
        assert_eq!(state.iterations, 1);
        assert!(state.call_timestamps.is_empty());
    }

    #[tokio::test]
    async fn test_resumes_from_persisted_iteration() {
        let temp = TempDir::new().unwrap();
        let dir = RalphDir::new(temp.path().join(".ralph"));
        dir.save_state(&LoopState {
            iterations: 7,
            ..Default::default()
        })
        .unwrap();

        let assistant = Arc::new(ScriptedAssistant::new());
        let workspace = FixedWorkspace::new(true);
        controller(temp.path(), &assistant, &workspace, options(2))
            .run()
            .await
            .unwrap();

        assert_eq!(dir.load_state().iterations, 9);
        assert!(dir.iteration_log_path(8).exists());
        assert!(dir.iteration_log_path(9).exists());
    }

    #[tokio::test]
    async fn test_iteration_count_saturates_at_max() {
        let temp = TempDir::new().unwrap();
        let dir = RalphDir::new(temp.path().join(".ralph"));
        dir.ensure().unwrap();
        fs::write(dir.state_path(), format!(r#"{{"iterations": {}}}"#, u32::MAX)).unwrap();

        let assistant = Arc::new(ScriptedAssistant::new());
        let workspace = FixedWorkspace::new(true);
        let outcome = controller(temp.path(), &assistant, &workspace, options(2))
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, LoopOutcome::BudgetExhausted);
        assert_eq!(assistant.calls(), 1);
        assert_eq!(dir.load_state().iterations, u32::MAX);
    }

    #[tokio::test]
    async fn test_coder_prompt_carries_task_files() {
        let temp = TempDir::new().unwrap();
        let dir = RalphDir::new(temp.path().join(".ralph"));
        dir.ensure().unwrap();
        fs::write(dir.tasks_path(), r#"{"features": [{"id": "T042", "status": "pending"}]}"#).unwrap();
        fs::write(dir.progress_path(), "# Ralph Progress\n- did T041").unwrap();

        let assistant = Arc::new(ScriptedAssistant::new());
        let workspace = FixedWorkspace::new(true);
        let opts = LoopOptions {
            verify_command: Some("cargo test".to_string()),
            ..options(1)
        };
        controller(temp.path(), &assistant, &workspace, opts).run().await.unwrap();

        let prompts = assistant.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("T042"));
        assert!(prompts[0].contains("- did T041"));
        assert!(prompts[0].contains("Build a todo app"));
        assert!(prompts[0].contains("`cargo test`"));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo", 2), "hé");
    }
}
