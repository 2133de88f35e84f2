use bulk_planning::PlanningError;
use thiserror::Error;

use crate::store::StoreError;

/// Failures reported by bank, vendor and notification endpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Endpoint answered with a non-success status.
    #[error("{service} responded with status {status}: {body}")]
    Status {
        /// Service name.
        service: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// Endpoint could not be reached.
    #[error("{service} is unreachable: {reason}")]
    Unreachable {
        /// Service name.
        service: String,
        /// Transport failure.
        reason: String,
    },
    /// Endpoint answered with something we cannot read.
    #[error("{service} returned an invalid response: {reason}")]
    InvalidResponse {
        /// Service name.
        service: String,
        /// Decoding failure.
        reason: String,
    },
    /// Request could not be built (missing URL, unknown truck).
    #[error("invalid request to {service}: {reason}")]
    InvalidRequest {
        /// Service name.
        service: String,
        /// What was wrong.
        reason: String,
    },
}

/// Errors surfaced by the orchestrator and its components.
#[derive(Debug, Error)]
pub enum AutonomyError {
    /// The simulated clock has no epoch yet.
    #[error("simulated clock is not initialized")]
    ClockNotInitialized,
    /// Simulated date left the calendar range.
    #[error("simulated date out of range after {0} days")]
    DateOutOfRange(i64),
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Bank, vendor or notification failure.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Pricing failure.
    #[error(transparent)]
    Planning(#[from] PlanningError),
    /// Delivered vehicles could not be recorded.
    #[error("There was an error adding the vehicle: {0}")]
    VehicleRegistration(String),
    /// One-time economic setup could not complete.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),
    /// Orchestrator built without a required collaborator.
    #[error("orchestrator is missing its {0}")]
    MissingCollaborator(&'static str),
    /// Poll task needs a Tokio runtime.
    #[error("no tokio runtime available to drive the tick loop")]
    NoRuntime,
}
