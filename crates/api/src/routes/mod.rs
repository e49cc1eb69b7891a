//! Route handlers

pub mod alerts;
pub mod cooldowns;
pub mod operations;
pub mod stats;
