//! Ralph - an autonomous iteration loop around a coding assistant
//!
//! Ralph runs in two phases. The initializer asks the assistant to turn a
//! prompt file into a task list; the coder loop then asks it, one fresh
//! context at a time, to implement the next pending task, until the task list
//! is done, the iteration budget runs out, or the circuit breaker opens.

pub mod assistant;
pub mod domain;
pub mod error;
pub mod project;
pub mod prompt;
pub mod runner;
pub mod storage;
pub mod workspace;

pub use error::{RalphError, Result};
