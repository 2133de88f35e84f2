//! Tick-driven orchestrator running one planning-and-dispatch cycle per simulated day.

/// The per-day sequence.
pub mod daily;
/// Builder utilities for the orchestrator.
pub mod maker;

use std::sync::{Arc, Weak};

use bulk_logging::LogLevel;
use bulk_planning::{
    DailyPlan, DeliveryCostCalculator, QuoteRequest, ShipmentPlanner, Vehicle, VehicleQuote,
    VehicleSelector,
};
use chrono::NaiveDate;
use daily::DayReport;
use maker::AutonomyOrchestratorBuilder;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{error, info, instrument, warn};

use crate::{
    bootstrap::EconomicBootstrap,
    clients::{
        parse_operating_cost, BankClient, NotificationTransport, TruckDelivery, TruckFailure,
        TruckVendor,
    },
    clock::{SimulatedClock, WallClock},
    config::AutonomyConfig,
    dispatch::NotificationDispatcher,
    errors::AutonomyError,
    lifecycle::{LifecycleOutcome, VehicleLifecycleManager},
    store::{
        CompanyStore, FleetStore, NewVehicle, NotificationQueueStore, RequestStore, ShipmentStore,
    },
    telemetry::AutonomyTelemetry,
};

/// In-memory orchestrator state. Reset on every stop.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AutonomyState {
    /// Whether the poll is scheduled.
    pub running: bool,
    /// Whether a day is being processed.
    pub processing_tick: bool,
    /// Whether the one-time bank and fleet setup has completed in this run.
    pub bootstrapped: bool,
    /// Whether the start-up loan is in place.
    pub has_active_loan: bool,
    /// Last known bank balance.
    pub funds: f64,
    /// Last simulated date fully processed.
    pub last_processed_sim_date: Option<NaiveDate>,
    /// Our bank account number, once known.
    pub account_number: Option<String>,
    /// Incremented on every start; ticks from an older start leave the state alone.
    pub generation: u64,
}

/// What a call to [`AutonomyOrchestrator::tick`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The orchestrator is stopped.
    Idle,
    /// Another tick is processing a day.
    Busy,
    /// The simulated date was already processed.
    AlreadyProcessed(NaiveDate),
    /// The day ran to completion.
    Processed(DayReport),
    /// The day failed and will be retried on the next tick.
    Failed(String),
}

pub(crate) struct Collaborators {
    pub(crate) requests: Arc<dyn RequestStore>,
    pub(crate) fleet: Arc<dyn FleetStore>,
    pub(crate) shipments: Arc<dyn ShipmentStore>,
    pub(crate) queue: Arc<dyn NotificationQueueStore>,
    pub(crate) companies: Arc<dyn CompanyStore>,
    pub(crate) transport: Arc<dyn NotificationTransport>,
    pub(crate) bank: Arc<dyn BankClient>,
    pub(crate) vendor: Arc<dyn TruckVendor>,
}

struct OrchestratorInner {
    config: AutonomyConfig,
    clock: Arc<SimulatedClock>,
    requests: Arc<dyn RequestStore>,
    fleet: Arc<dyn FleetStore>,
    shipments: Arc<dyn ShipmentStore>,
    bank: Arc<dyn BankClient>,
    dispatcher: NotificationDispatcher,
    lifecycle: VehicleLifecycleManager,
    bootstrap: EconomicBootstrap,
    planner: ShipmentPlanner,
    selector: VehicleSelector,
    pricing: DeliveryCostCalculator,
    telemetry: Option<AutonomyTelemetry>,
    state: Mutex<AutonomyState>,
    poll: Mutex<Option<JoinHandle<()>>>,
}

/// Drives the fleet through simulated days.
///
/// Cloning yields another handle to the same orchestrator.
#[derive(Clone)]
pub struct AutonomyOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl std::fmt::Debug for AutonomyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutonomyOrchestrator")
            .field("company", &self.inner.config.company_name)
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

impl AutonomyOrchestrator {
    /// Returns a builder for the orchestrator.
    #[must_use]
    pub fn builder(config: AutonomyConfig) -> AutonomyOrchestratorBuilder {
        AutonomyOrchestratorBuilder::new(config)
    }

    pub(crate) fn assemble(
        config: AutonomyConfig,
        wall_clock: Arc<dyn WallClock>,
        parts: Collaborators,
        pricing: DeliveryCostCalculator,
        telemetry: Option<AutonomyTelemetry>,
    ) -> Self {
        let clock = Arc::new(SimulatedClock::new(
            wall_clock,
            config.day_length_ms,
            config.simulation_start,
        ));
        let mut dispatcher = NotificationDispatcher::new(parts.transport, parts.queue);
        let mut lifecycle = VehicleLifecycleManager::new(
            parts.fleet.clone(),
            clock.clone(),
            config.reactivation_delay_days,
        );
        let mut bootstrap = EconomicBootstrap::new(
            config.company_name.clone(),
            parts.bank.clone(),
            parts.vendor,
            parts.fleet.clone(),
            parts.companies,
        )
        .bank_notification_url(config.bank_notification_url.clone())
        .loan_cover_multiplier(config.loan_cover_multiplier)
        .initial_fleet(config.initial_fleet.clone());
        if let Some(tel) = &telemetry {
            dispatcher = dispatcher.with_telemetry(tel.clone());
            lifecycle = lifecycle.with_telemetry(tel.clone());
            bootstrap = bootstrap.with_telemetry(tel.clone());
        }
        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                clock,
                requests: parts.requests,
                fleet: parts.fleet,
                shipments: parts.shipments,
                bank: parts.bank,
                dispatcher,
                lifecycle,
                bootstrap,
                planner: ShipmentPlanner::new(),
                selector: VehicleSelector::new(),
                pricing,
                telemetry,
                state: Mutex::new(AutonomyState::default()),
                poll: Mutex::new(None),
            }),
        }
    }

    /// Snapshot of the in-memory state.
    #[must_use]
    pub fn state(&self) -> AutonomyState {
        self.inner.state.lock().clone()
    }

    /// The simulated clock.
    #[must_use]
    pub fn clock(&self) -> &SimulatedClock {
        &self.inner.clock
    }

    /// Anchors the simulated clock at `epoch_ms` and schedules the poll.
    ///
    /// The first tick fires immediately. Starting a running orchestrator is a no-op.
    pub fn start(&self, epoch_ms: i64) -> Result<(), AutonomyError> {
        let runtime = Handle::try_current().map_err(|_| AutonomyError::NoRuntime)?;
        let mut state = self.inner.state.lock();
        if state.running {
            warn!("orchestrator already running; start ignored");
            return Ok(());
        }
        self.inner.clock.initialize(epoch_ms);
        *state = AutonomyState {
            running: true,
            generation: state.generation + 1,
            ..AutonomyState::default()
        };
        // poll handle is replaced under the state lock; stop takes it under the same lock
        let poll = runtime.spawn(poll_loop(
            Arc::downgrade(&self.inner),
            self.inner.config.tick_interval(),
        ));
        if let Some(previous) = self.inner.poll.lock().replace(poll) {
            previous.abort();
        }
        drop(state);
        info!(
            epoch_ms,
            start = %self.inner.config.simulation_start,
            "orchestrator started"
        );
        Ok(())
    }

    /// Cancels the poll and clears the in-memory state. Stopping a stopped
    /// orchestrator is a no-op; a tick already in flight runs to completion.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if !state.running {
            warn!("orchestrator not running; stop ignored");
            return;
        }
        if let Some(poll) = self.inner.poll.lock().take() {
            poll.abort();
        }
        *state = AutonomyState {
            generation: state.generation,
            ..AutonomyState::default()
        };
        info!("orchestrator stopped");
    }

    /// Restarts a running orchestrator with a new epoch.
    pub fn reset(&self, epoch_ms: i64) -> Result<(), AutonomyError> {
        if !self.inner.state.lock().running {
            warn!("orchestrator not running; reset ignored");
            return Ok(());
        }
        self.stop();
        self.start(epoch_ms)
    }

    /// Processes today's simulated date unless it was already processed.
    #[instrument(skip(self), name = "autonomy.tick")]
    pub async fn tick(&self) -> TickOutcome {
        let (generation, today, bootstrap) = {
            let mut state = self.inner.state.lock();
            if !state.running {
                return TickOutcome::Idle;
            }
            if state.processing_tick {
                warn!("previous tick still processing; skipping");
                return TickOutcome::Busy;
            }
            let today = match self.inner.clock.current_date() {
                Ok(today) => today,
                Err(err) => return TickOutcome::Failed(err.to_string()),
            };
            if state.last_processed_sim_date == Some(today) {
                return TickOutcome::AlreadyProcessed(today);
            }
            state.processing_tick = true;
            (state.generation, today, !state.bootstrapped)
        };

        let result = self.run_day(generation, today, bootstrap).await;

        {
            let mut state = self.inner.state.lock();
            if state.generation == generation {
                state.processing_tick = false;
                if result.is_ok() {
                    state.last_processed_sim_date = Some(today);
                }
            }
        }

        match result {
            Ok(report) => TickOutcome::Processed(report),
            Err(err) => {
                let reason = err.to_string();
                error!(%today, %reason, "daily tick failed");
                if let Some(tel) = &self.inner.telemetry {
                    let payload = json!({ "reason": reason });
                    let _ = tel.log(LogLevel::Error, "tick.failed", Some(today), payload.clone());
                    let _ = tel.event("autonomy.tick.failed", Some(today), payload).await;
                }
                TickOutcome::Failed(reason)
            }
        }
    }

    /// Runs the planner for today without committing anything.
    pub async fn plan_daily_shipments(&self) -> Result<DailyPlan, AutonomyError> {
        let today = self.inner.clock.current_date()?;
        self.plan_for(today).await
    }

    pub(crate) async fn plan_for(&self, date: NaiveDate) -> Result<DailyPlan, AutonomyError> {
        let requests = self.inner.requests.find_paid_and_unshipped().await?;
        let vehicles = self.inner.fleet.find_available_vehicles(date).await?;
        Ok(self.inner.planner.plan(&requests, &vehicles))
    }

    /// Picks vehicles for an incoming request from the whole fleet.
    pub async fn get_vehicle_for_pickup_request(
        &self,
        request: &QuoteRequest,
    ) -> Result<VehicleQuote, AutonomyError> {
        let fleet = self.inner.fleet.all_vehicles().await?;
        Ok(self.inner.selector.select(request, &fleet))
    }

    /// Prices an incoming request.
    pub async fn quote_delivery_cost(&self, request: &QuoteRequest) -> Result<u64, AutonomyError> {
        let fleet = self.inner.fleet.all_vehicles().await?;
        Ok(self.inner.pricing.quote(request, &fleet)?)
    }

    /// Records trucks announced by the vendor, one vehicle per unit.
    pub async fn handle_truck_delivery(
        &self,
        delivery: &TruckDelivery,
    ) -> Result<Vec<Vehicle>, AutonomyError> {
        if !delivery.can_fulfill {
            warn!(
                truck = %delivery.item_name,
                message = delivery.message.as_deref().unwrap_or_default(),
                "vendor cannot fulfill truck order"
            );
            return Ok(Vec::new());
        }
        let purchase_date = self.inner.clock.current_date_or_start();
        let daily_operational_cost = parse_operating_cost(&delivery.operating_cost_per_day)
            .ok_or_else(|| {
                AutonomyError::VehicleRegistration(format!(
                    "unreadable operating cost {:?}",
                    delivery.operating_cost_per_day
                ))
            })?;
        let mut registered = Vec::new();
        for _ in 0..delivery.quantity {
            let vehicle = self
                .inner
                .fleet
                .insert_vehicle(NewVehicle {
                    type_name: delivery.item_name.clone(),
                    purchase_date,
                    daily_operational_cost,
                    load_capacity: delivery.maximum_load,
                })
                .await
                .map_err(|err| AutonomyError::VehicleRegistration(err.to_string()))?;
            registered.push(vehicle);
        }
        info!(truck = %delivery.item_name, count = registered.len(), "trucks registered");
        if let Some(tel) = &self.inner.telemetry {
            let ids: Vec<_> = registered.iter().map(|v| v.id).collect();
            let _ = tel
                .event(
                    "autonomy.vehicles.registered",
                    Some(purchase_date),
                    json!({ "type": delivery.item_name, "vehicle_ids": ids }),
                )
                .await;
        }
        Ok(registered)
    }

    /// Takes broken-down trucks out of service.
    pub async fn handle_vehicle_failure(
        &self,
        failure: &TruckFailure,
    ) -> Result<LifecycleOutcome, AutonomyError> {
        self.inner
            .lifecycle
            .fail_vehicles(&failure.truck_name, failure.failure_quantity)
            .await
    }

    /// Acknowledges a crashed shipment. Insurance replaces lost goods, so nothing changes.
    pub fn handle_shipment_crash(&self) {
        let today = self.inner.clock.current_date().ok();
        info!(?today, "shipment crash reported; insured, no loss recorded");
        if let Some(tel) = &self.inner.telemetry {
            let _ = tel.log(LogLevel::Info, "shipment.crash", today, json!({ "loss": 0 }));
        }
    }

    fn update_state(&self, generation: u64, apply: impl FnOnce(&mut AutonomyState)) {
        let mut state = self.inner.state.lock();
        if state.generation == generation {
            apply(&mut state);
        }
    }
}

async fn poll_loop(inner: Weak<OrchestratorInner>, period: std::time::Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let orchestrator = AutonomyOrchestrator { inner };
        tokio::spawn(async move {
            orchestrator.tick().await;
        });
    }
}
