//! Storage layer for Ralph - the on-disk layout of the ralph directory.
//!
//! Everything the loop persists lives under one directory (`.ralph/` by
//! default):
//!
//! ```text
//! .ralph/
//!   tasks.json      task list written by the initializer, updated by the assistant
//!   progress.md     human-readable log maintained by the assistant
//!   init.sh         setup script written by the initializer
//!   state.json      LoopState, rewritten after every iteration
//!   STATUS          terminal status marker (EXIT_SIGNAL: true)
//!   STOP            manual stop request, consumed when seen
//!   logs/           initializer.md and iteration-NNN.md
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::domain::{LoopState, TaskFile};
use crate::error::{RalphError, Result};

pub const STATE_FILE: &str = "state.json";
pub const TASKS_FILE: &str = "tasks.json";
pub const PROGRESS_FILE: &str = "progress.md";
pub const STATUS_FILE: &str = "STATUS";
pub const STOP_FILE: &str = "STOP";
pub const LOGS_DIR: &str = "logs";

/// Handle on a ralph directory
#[derive(Debug, Clone)]
pub struct RalphDir {
    root: PathBuf,
}

impl RalphDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.root.join(TASKS_FILE)
    }

    pub fn progress_path(&self) -> PathBuf {
        self.root.join(PROGRESS_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join(STATUS_FILE)
    }

    pub fn stop_path(&self) -> PathBuf {
        self.root.join(STOP_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn initializer_log_path(&self) -> PathBuf {
        self.logs_dir().join("initializer.md")
    }

    pub fn iteration_log_path(&self, iteration: u32) -> PathBuf {
        self.logs_dir().join(format!("iteration-{:03}.md", iteration))
    }

    /// Create the directory and its `logs/` subdirectory
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    /// Load loop state, falling back to a fresh state when the file is missing or corrupt
    pub fn load_state(&self) -> LoopState {
        let path = self.state_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", path.display());
                return LoopState::default();
            }
            Err(e) => {
                warn!("Failed to read {}: {}; starting fresh", path.display(), e);
                return LoopState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!("Corrupt state file {}: {}; starting fresh", path.display(), e);
                LoopState::default()
            }
        }
    }

    /// Persist loop state as pretty-printed JSON
    pub fn save_state(&self, state: &LoopState) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(state)?;
        fs::write(self.state_path(), json)?;
        Ok(())
    }

    /// Remove persisted state. Returns true if there was anything to remove.
    pub fn reset_state(&self) -> Result<bool> {
        remove_if_exists(&self.state_path())
    }

    /// Parse the task list
    pub fn load_tasks(&self) -> Result<TaskFile> {
        let path = self.tasks_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(RalphError::TaskFileMissing(path)),
            Err(e) => return Err(e.into()),
        };
        TaskFile::from_json(&content).map_err(|source| RalphError::InvalidTaskFile { path, source })
    }

    /// Raw task list text for the coder prompt, `{}` when absent
    pub fn read_tasks_raw(&self) -> String {
        fs::read_to_string(self.tasks_path()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Progress log text, empty when absent
    pub fn read_progress(&self) -> String {
        fs::read_to_string(self.progress_path()).unwrap_or_default()
    }

    /// Contents of the terminal status marker, if present
    pub fn read_status(&self) -> Option<String> {
        fs::read_to_string(self.status_path()).ok()
    }

    /// Consume a pending stop request. Returns true if one was present.
    pub fn take_stop_request(&self) -> Result<bool> {
        remove_if_exists(&self.stop_path())
    }

    /// Ask a running loop to halt at the top of its next iteration
    pub fn request_stop(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.stop_path(), "")?;
        Ok(())
    }

    pub fn write_initializer_log(&self, text: &str) -> Result<()> {
        self.write_log(&self.initializer_log_path(), text)
    }

    pub fn write_iteration_log(&self, iteration: u32, text: &str) -> Result<()> {
        self.write_log(&self.iteration_log_path(iteration), text)
    }

    fn write_log(&self, path: &Path, text: &str) -> Result<()> {
        fs::create_dir_all(self.logs_dir())?;
        fs::write(path, text)?;
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CircuitState;
    use tempfile::TempDir;

    fn create_test_dir() -> (RalphDir, TempDir) {
        let temp = TempDir::new().unwrap();
        let dir = RalphDir::new(temp.path().join(".ralph"));
        (dir, temp)
    }

    #[test]
    fn test_paths() {
        let dir = RalphDir::new("/work/.ralph");
        assert_eq!(dir.state_path(), PathBuf::from("/work/.ralph/state.json"));
        assert_eq!(dir.tasks_path(), PathBuf::from("/work/.ralph/tasks.json"));
        assert_eq!(dir.iteration_log_path(7), PathBuf::from("/work/.ralph/logs/iteration-007.md"));
        assert_eq!(dir.initializer_log_path(), PathBuf::from("/work/.ralph/logs/initializer.md"));
    }

    #[test]
    fn test_missing_state_is_default() {
        let (dir, _temp) = create_test_dir();
        assert_eq!(dir.load_state(), LoopState::default());
    }

    #[test]
    fn test_state_roundtrip() {
        let (dir, _temp) = create_test_dir();
        let state = LoopState {
            iterations: 4,
            consecutive_no_progress: 2,
            last_error: "ERROR: claude invocation timed out after 3600s".to_string(),
            same_error_count: 3,
            call_timestamps: vec![1_700_000_000.25, 1_700_000_100.5],
            circuit_state: CircuitState::Open,
        };

        dir.save_state(&state).unwrap();
        assert_eq!(dir.load_state(), state);
    }

    #[test]
    fn test_corrupt_state_is_default() {
        let (dir, _temp) = create_test_dir();
        dir.ensure().unwrap();
        fs::write(dir.state_path(), "{ not json").unwrap();
        assert_eq!(dir.load_state(), LoopState::default());
    }

    #[test]
    fn test_reset_state() {
        let (dir, _temp) = create_test_dir();
        assert!(!dir.reset_state().unwrap());
        dir.save_state(&LoopState::default()).unwrap();
        assert!(dir.reset_state().unwrap());
        assert!(!dir.state_path().exists());
    }

    #[test]
    fn test_load_tasks_missing() {
        let (dir, _temp) = create_test_dir();
        assert!(matches!(dir.load_tasks(), Err(RalphError::TaskFileMissing(_))));
        assert_eq!(dir.read_tasks_raw(), "{}");
    }

    #[test]
    fn test_load_tasks_invalid() {
        let (dir, _temp) = create_test_dir();
        dir.ensure().unwrap();
        fs::write(dir.tasks_path(), "{\"features\": [,]}").unwrap();
        assert!(matches!(dir.load_tasks(), Err(RalphError::InvalidTaskFile { .. })));
    }

    #[test]
    fn test_load_tasks_valid() {
        let (dir, _temp) = create_test_dir();
        dir.ensure().unwrap();
        fs::write(
            dir.tasks_path(),
            r#"{"task": "demo", "features": [{"id": "T001", "title": "one", "priority": 1, "status": "pending"}]}"#,
        )
        .unwrap();
        let tasks = dir.load_tasks().unwrap();
        assert_eq!(tasks.task, "demo");
        assert_eq!(tasks.pending_count(), 1);
    }

    #[test]
    fn test_stop_request_is_consumed() {
        let (dir, _temp) = create_test_dir();
        assert!(!dir.take_stop_request().unwrap());
        dir.request_stop().unwrap();
        assert!(dir.stop_path().exists());
        assert!(dir.take_stop_request().unwrap());
        assert!(!dir.stop_path().exists());
    }

    #[test]
    fn test_progress_and_status_defaults() {
        let (dir, _temp) = create_test_dir();
        assert_eq!(dir.read_progress(), "");
        assert!(dir.read_status().is_none());
    }

    #[test]
    fn test_iteration_log_written() {
        let (dir, _temp) = create_test_dir();
        dir.write_iteration_log(3, "did things").unwrap();
        assert_eq!(fs::read_to_string(dir.iteration_log_path(3)).unwrap(), "did things");
    }
}
