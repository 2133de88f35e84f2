#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Fleet autonomy: a simulated clock driving daily planning, pickup and
//! delivery notices with a retry ledger, vehicle lifecycle and the one-time
//! economic bootstrap.

/// One-time bank and fleet setup.
#[path = "../bootstrap.rs"]
pub mod bootstrap;

/// Bank, truck vendor and notification clients.
#[path = "../clients/main.rs"]
pub mod clients;

/// Simulated calendar.
#[path = "../clock.rs"]
pub mod clock;

/// TOML settings.
#[path = "../config.rs"]
pub mod config;

/// Notification dispatch and retry ledger handling.
#[path = "../dispatch.rs"]
pub mod dispatch;

/// Error types.
#[path = "../errors.rs"]
pub mod errors;

/// Vehicle failure and reactivation.
#[path = "../lifecycle.rs"]
pub mod lifecycle;

/// Tick-driven orchestrator.
#[path = "../orchestrator/main.rs"]
pub mod orchestrator;

/// Persistence contracts and the in-memory store.
#[path = "../store/main.rs"]
pub mod store;

/// Telemetry helpers.
#[path = "../telemetry.rs"]
pub mod telemetry;

pub use bootstrap::{BootstrapReport, EconomicBootstrap};
pub use clients::{
    BankClient, HttpBankClient, HttpNotificationTransport, HttpTruckVendor, LoopbackBank,
    LoopbackVendor, NotificationTransport, ScriptedTransport, TruckDelivery, TruckFailure,
    TruckVendor,
};
pub use clock::{ManualWallClock, SimulatedClock, SystemWallClock, WallClock};
pub use config::{AutonomyConfig, FleetOrder};
pub use dispatch::{DispatchOrigin, DispatchOutcome, LogisticsNotification, NotificationDispatcher};
pub use errors::{AutonomyError, ServiceError};
pub use lifecycle::{LifecycleOutcome, VehicleLifecycleManager};
pub use orchestrator::{
    daily::DayReport, maker::AutonomyOrchestratorBuilder, AutonomyOrchestrator, AutonomyState,
    TickOutcome,
};
pub use store::{
    CompanyStore, FleetStore, InMemoryStore, NotificationQueueStore, RequestStore, ShipmentStore,
    StoreError,
};
pub use telemetry::{AutonomyTelemetry, AutonomyTelemetryBuilder};
