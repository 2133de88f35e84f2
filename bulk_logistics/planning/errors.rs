use thiserror::Error;

/// Errors raised by pricing and quoting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanningError {
    /// A selected vehicle has a type the price table does not know.
    #[error("Unknown vehicle type: {0}")]
    UnknownVehicleType(String),
    /// A vehicle type reports zero pickups per day and cannot amortise its cost.
    #[error("vehicle type {0} allows no pickups per day")]
    NoPickupCapacity(String),
}
