//! Workspace - progress detection and per-iteration commits over git

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::Command;

const DIFF_TIMEOUT: Duration = Duration::from_secs(30);
const COMMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// The working tree the assistant edits
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Whether the last iteration changed anything
    async fn has_progress(&self) -> bool;

    /// Stage everything and commit. Returns true if a commit was created.
    async fn commit_all(&self, message: &str) -> bool;
}

/// Workspace backed by the git repository at `root`
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    root: PathBuf,
}

impl GitWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn git(&self, args: &[&str], limit: Duration) -> Result<Output, String> {
        let child = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(limit, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(format!("git {}: {}", args.join(" "), e)),
            Err(_) => Err(format!("git {} timed out after {}s", args.join(" "), limit.as_secs())),
        }
    }
}

#[async_trait]
impl Workspace for GitWorkspace {
    /// Non-empty `git diff --stat HEAD~1` means progress. When git cannot
    /// answer (no repository, a single commit) progress is assumed so the
    /// circuit never opens on a missing signal.
    async fn has_progress(&self) -> bool {
        match self.git(&["diff", "--stat", "HEAD~1"], DIFF_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                let changed = !String::from_utf8_lossy(&output.stdout).trim().is_empty();
                debug!("git diff --stat HEAD~1: changed={}", changed);
                changed
            }
            Ok(output) => {
                debug!(
                    "git diff failed, assuming progress: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                true
            }
            Err(e) => {
                warn!("{}; assuming progress", e);
                true
            }
        }
    }

    async fn commit_all(&self, message: &str) -> bool {
        match self.git(&["add", "-A"], DIFF_TIMEOUT).await {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                warn!("git add failed: {}", String::from_utf8_lossy(&output.stderr).trim());
                return false;
            }
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        }

        match self.git(&["commit", "-m", message], COMMIT_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                info!("Committed: {}", message);
                true
            }
            Ok(output) => {
                // "nothing to commit" lands on stdout
                let stdout = String::from_utf8_lossy(&output.stdout);
                if stdout.contains("nothing to commit") {
                    debug!("Nothing to commit for '{}'", message);
                } else {
                    warn!("git commit failed: {}", String::from_utf8_lossy(&output.stderr).trim());
                }
                false
            }
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}
