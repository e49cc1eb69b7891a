//! Operation Authorization
//!
//! The operation lifecycle state machine: queues proposed infrastructure
//! actions, tags them with assessed risk, gates dangerous ones behind
//! human confirmation, enforces per-target cooldowns at execution time,
//! and tracks approval, rejection, execution, cancellation, and retry.
//!
//! The engine never touches real infrastructure. `Executed` means
//! "authorized and dispatched"; the injected [`OperationExecutor`]
//! reports the true outcome.

mod authorizer;
mod error;
mod operation;

pub use authorizer::{AuthorizerStats, NoopExecutor, OperationAuthorizer, OperationExecutor};
pub use error::AuthorizerError;
pub use operation::{Operation, OperationInput, OperationResult, OperationStatus};
