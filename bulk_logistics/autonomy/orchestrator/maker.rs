use std::sync::Arc;

use bulk_planning::DeliveryCostCalculator;

use super::{AutonomyOrchestrator, Collaborators};
use crate::{
    clients::{BankClient, NotificationTransport, TruckVendor},
    clock::{SystemWallClock, WallClock},
    config::AutonomyConfig,
    errors::AutonomyError,
    store::{CompanyStore, FleetStore, NotificationQueueStore, RequestStore, ShipmentStore},
    telemetry::AutonomyTelemetry,
};

/// Builder used to wire an [`AutonomyOrchestrator`] to its collaborators.
#[derive(Default)]
pub struct AutonomyOrchestratorBuilder {
    config: AutonomyConfig,
    wall_clock: Option<Arc<dyn WallClock>>,
    requests: Option<Arc<dyn RequestStore>>,
    fleet: Option<Arc<dyn FleetStore>>,
    shipments: Option<Arc<dyn ShipmentStore>>,
    queue: Option<Arc<dyn NotificationQueueStore>>,
    companies: Option<Arc<dyn CompanyStore>>,
    transport: Option<Arc<dyn NotificationTransport>>,
    bank: Option<Arc<dyn BankClient>>,
    vendor: Option<Arc<dyn TruckVendor>>,
    pricing: DeliveryCostCalculator,
    telemetry: Option<AutonomyTelemetry>,
}

impl AutonomyOrchestratorBuilder {
    /// Creates a builder for the given settings.
    #[must_use]
    pub fn new(config: AutonomyConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Overrides the real-time source (defaults to the system clock).
    #[must_use]
    pub fn wall_clock(mut self, wall_clock: Arc<dyn WallClock>) -> Self {
        self.wall_clock = Some(wall_clock);
        self
    }

    /// Uses one backend for every store.
    #[must_use]
    pub fn store<S>(self, store: Arc<S>) -> Self
    where
        S: RequestStore
            + FleetStore
            + ShipmentStore
            + NotificationQueueStore
            + CompanyStore
            + 'static,
    {
        self.requests(store.clone())
            .fleet(store.clone())
            .shipments(store.clone())
            .notification_queue(store.clone())
            .companies(store)
    }

    /// Pickup request store.
    #[must_use]
    pub fn requests(mut self, store: Arc<dyn RequestStore>) -> Self {
        self.requests = Some(store);
        self
    }

    /// Vehicle store.
    #[must_use]
    pub fn fleet(mut self, store: Arc<dyn FleetStore>) -> Self {
        self.fleet = Some(store);
        self
    }

    /// Shipment store.
    #[must_use]
    pub fn shipments(mut self, store: Arc<dyn ShipmentStore>) -> Self {
        self.shipments = Some(store);
        self
    }

    /// Notification retry ledger.
    #[must_use]
    pub fn notification_queue(mut self, store: Arc<dyn NotificationQueueStore>) -> Self {
        self.queue = Some(store);
        self
    }

    /// Company store.
    #[must_use]
    pub fn companies(mut self, store: Arc<dyn CompanyStore>) -> Self {
        self.companies = Some(store);
        self
    }

    /// Outbound notification transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn NotificationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Commercial bank client.
    #[must_use]
    pub fn bank(mut self, bank: Arc<dyn BankClient>) -> Self {
        self.bank = Some(bank);
        self
    }

    /// Truck vendor client.
    #[must_use]
    pub fn vendor(mut self, vendor: Arc<dyn TruckVendor>) -> Self {
        self.vendor = Some(vendor);
        self
    }

    /// Overrides delivery pricing.
    #[must_use]
    pub const fn pricing(mut self, pricing: DeliveryCostCalculator) -> Self {
        self.pricing = pricing;
        self
    }

    /// Attaches telemetry shared by every component.
    #[must_use]
    pub fn telemetry(mut self, telemetry: AutonomyTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Finalizes the orchestrator; every store and client must be set.
    pub fn build(self) -> Result<AutonomyOrchestrator, AutonomyError> {
        let collaborators = Collaborators {
            requests: self
                .requests
                .ok_or(AutonomyError::MissingCollaborator("request store"))?,
            fleet: self.fleet.ok_or(AutonomyError::MissingCollaborator("fleet store"))?,
            shipments: self
                .shipments
                .ok_or(AutonomyError::MissingCollaborator("shipment store"))?,
            queue: self
                .queue
                .ok_or(AutonomyError::MissingCollaborator("notification queue"))?,
            companies: self
                .companies
                .ok_or(AutonomyError::MissingCollaborator("company store"))?,
            transport: self
                .transport
                .ok_or(AutonomyError::MissingCollaborator("notification transport"))?,
            bank: self.bank.ok_or(AutonomyError::MissingCollaborator("bank client"))?,
            vendor: self
                .vendor
                .ok_or(AutonomyError::MissingCollaborator("truck vendor"))?,
        };
        let wall_clock = self
            .wall_clock
            .unwrap_or_else(|| Arc::new(SystemWallClock));
        Ok(AutonomyOrchestrator::assemble(
            self.config,
            wall_clock,
            collaborators,
            self.pricing,
            self.telemetry,
        ))
    }
}
