//! Domain types for Ralph
//!
//! - LoopState: controller bookkeeping persisted between iterations
//! - TaskFile / Task: the task list the assistant works through

pub mod lenient;
pub mod loop_state;
pub mod task;

pub use loop_state::{CircuitState, LoopState};
pub use task::{Task, TaskFile, TaskStatus};
