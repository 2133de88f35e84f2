#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Fleet planning: domain records, the daily two-pass shipment planner,
//! vehicle quoting for new requests and delivery pricing.

/// Planning error types.
#[path = "../errors.rs"]
pub mod errors;
/// Fleet and pickup-request records.
#[path = "../model.rs"]
pub mod model;
/// Delivery cost pricing on top of vehicle quotes.
#[path = "../pricing.rs"]
pub mod pricing;
/// Vehicle selection for incoming requests.
#[path = "../selection.rs"]
pub mod selection;
/// Daily shipment planning.
#[path = "../shipment/main.rs"]
pub mod shipment;

pub use errors::PlanningError;
pub use model::{
    CapacityType, CompanyRef, PaymentStatus, PickupRequest, PickupRequestId, PickupRequestItem,
    PickupRequestItemId, ShipmentId, Vehicle, VehicleId, VehicleType,
};
pub use pricing::DeliveryCostCalculator;
pub use selection::{QuoteItem, QuoteRequest, VehicleQuote, VehicleSelector};
pub use shipment::{DailyPlan, PlannableVehicle, PlannedItem, ShipmentPlan, ShipmentPlanner};
