//! Authorizer Error Types

use crate::operation::OperationStatus;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the operation state machine
#[derive(Debug, Clone, Error)]
pub enum AuthorizerError {
    /// No operation with this id
    #[error("operation {id} not found")]
    NotFound { id: Uuid },

    /// The operation is not in the state the call requires
    #[error("operation {id} is {status:?}, expected {expected}")]
    InvalidTransition {
        id: Uuid,
        status: OperationStatus,
        expected: &'static str,
    },

    /// Execution attempted while the (type, target) cooldown is active
    #[error("rate limited: wait {remaining_ms}ms before executing again")]
    RateLimited { remaining_ms: u64 },
}
