//! Cooldown Limiting
//!
//! Prevents the same (operation type, target) pair from executing again
//! before its configured cooldown elapses, and counts executions.

mod limiter;

pub use limiter::{CooldownError, CooldownLimiter, CooldownStats, OpKey};
