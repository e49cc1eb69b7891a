//! Risk Assessment
//!
//! Pure, deterministic risk classification for infrastructure operations.
//! No side effects, no I/O, cannot fail.

mod assessor;

pub use assessor::{
    assess_risk, compare_risk_levels, cooldown_ms, is_risk_at_or_above, max_retries,
    max_risk_level, requires_confirmation,
};
