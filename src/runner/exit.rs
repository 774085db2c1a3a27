//! Exit condition - the assistant says it is done AND the task list agrees

use log::debug;

use crate::storage::RalphDir;

/// Marker the coder writes to `STATUS` once every task is complete
pub const EXIT_SIGNAL: &str = "EXIT_SIGNAL: true";

/// True only when `STATUS` carries the exit signal and `tasks.json` parses
/// with zero pending tasks
pub fn is_complete(dir: &RalphDir) -> bool {
    let Some(status) = dir.read_status() else {
        return false;
    };
    if !status.contains(EXIT_SIGNAL) {
        debug!("STATUS present without exit signal");
        return false;
    }

    match dir.load_tasks() {
        Ok(tasks) => {
            let pending = tasks.pending_count();
            debug!("Exit signal seen, {} pending task(s)", pending);
            pending == 0
        }
        Err(e) => {
            debug!("Exit signal seen but task list unreadable: {}", e);
            false
        }
    }
}
