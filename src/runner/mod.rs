//! Loop runner module - the two phases of a Ralph run.
//!
//! - `initializer`: Phase 1, plans the task list
//! - `controller`: Phase 2, the coder loop with rate limiting and a circuit breaker

pub mod circuit;
mod controller;
pub mod exit;
mod initializer;
pub mod rate_limit;

pub use circuit::{CircuitBreaker, TripReason};
pub use controller::{LoopController, LoopOptions, LoopOutcome};
pub use initializer::{InitOptions, InitOutcome, read_prompt_file, run_initializer};
pub use rate_limit::RateLimiter;
