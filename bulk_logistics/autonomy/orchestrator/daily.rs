use bulk_logging::LogLevel;
use bulk_planning::{ShipmentId, ShipmentPlan};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::AutonomyOrchestrator;
use crate::{
    bootstrap::BootstrapReport,
    dispatch::{DispatchOrigin, DispatchOutcome, LogisticsNotification},
    errors::AutonomyError,
};

/// Summary of one processed simulated day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayReport {
    /// Simulated date processed.
    pub date: NaiveDate,
    /// Setup performed on the first day of a run.
    pub bootstrap: Option<BootstrapReport>,
    /// Bank balance read at the start of the day, if the bank answered.
    pub funds: Option<f64>,
    /// Vehicles returned to service.
    pub vehicles_reactivated: usize,
    /// Vehicles planned onto.
    pub plans: usize,
    /// Items planned.
    pub items_planned: usize,
    /// Items left behind because their pickup notice failed.
    pub pickups_failed: usize,
    /// Shipments committed.
    pub shipments_created: Vec<ShipmentId>,
    /// Vehicles whose shipment could not be committed.
    pub commit_failures: usize,
    /// Delivery notices acknowledged, fresh and retried.
    pub deliveries_sent: usize,
    /// Delivery notices left in the retry ledger.
    pub notifications_queued: usize,
    /// Requests completed today.
    pub requests_completed: usize,
}

impl DayReport {
    const fn new(date: NaiveDate) -> Self {
        Self {
            date,
            bootstrap: None,
            funds: None,
            vehicles_reactivated: 0,
            plans: 0,
            items_planned: 0,
            pickups_failed: 0,
            shipments_created: Vec::new(),
            commit_failures: 0,
            deliveries_sent: 0,
            notifications_queued: 0,
            requests_completed: 0,
        }
    }
}

impl AutonomyOrchestrator {
    pub(super) async fn run_day(
        &self,
        generation: u64,
        today: NaiveDate,
        bootstrap: bool,
    ) -> Result<DayReport, AutonomyError> {
        let mut report = DayReport::new(today);
        info!(%today, "daily tick started");

        if bootstrap {
            let setup = self.inner.bootstrap.run(today).await?;
            self.update_state(generation, |state| {
                state.bootstrapped = true;
                state.has_active_loan = true;
                state.funds = setup.funds;
                state.account_number = Some(setup.account_number.clone());
            });
            report.bootstrap = Some(setup);
        }

        match self.inner.bank.balance().await {
            Ok(funds) => {
                self.update_state(generation, |state| state.funds = funds);
                report.funds = Some(funds);
            }
            Err(err) => warn!(%err, "balance refresh failed"),
        }

        report.vehicles_reactivated = self
            .inner
            .lifecycle
            .reactivate_eligible_vehicles(today)
            .await?
            .vehicles
            .len();

        let plan = self.plan_for(today).await?;
        report.plans = plan.plans.len();
        report.items_planned = plan.item_count();
        let mut deliveries = Vec::new();
        for shipment in &plan.plans {
            deliveries.extend(self.dispatch_shipment(shipment, today, &mut report).await);
        }

        tokio::time::sleep(self.inner.clock.transit_delay()).await;

        let retries = self.inner.dispatcher.queued().await?;
        let batch: Vec<(LogisticsNotification, DispatchOrigin)> = deliveries
            .into_iter()
            .map(|notice| (notice, DispatchOrigin::Fresh))
            .chain(retries.into_iter().map(|notice| (notice, DispatchOrigin::Retry)))
            .collect();
        for (outcome, (notice, _)) in self
            .inner
            .dispatcher
            .dispatch_all(&batch, today)
            .await
            .into_iter()
            .zip(&batch)
        {
            match outcome {
                Ok(DispatchOutcome::Delivered { .. }) => report.deliveries_sent += 1,
                Ok(DispatchOutcome::Queued { .. }) => report.notifications_queued += 1,
                Err(err) => error!(
                    request_id = notice.pickup_request_id,
                    %err,
                    "delivery notice lost: retry ledger unavailable"
                ),
            }
        }

        report.requests_completed = self.inner.requests.mark_completed(today).await?;

        if let Some(tel) = &self.inner.telemetry {
            let payload = json!({
                "plans": report.plans,
                "items_planned": report.items_planned,
                "pickups_failed": report.pickups_failed,
                "shipments": report.shipments_created,
                "deliveries_sent": report.deliveries_sent,
                "notifications_queued": report.notifications_queued,
                "requests_completed": report.requests_completed,
            });
            let _ = tel.log(LogLevel::Info, "day.completed", Some(today), payload.clone());
            let _ = tel.event("autonomy.day.completed", Some(today), payload).await;
        }
        info!(
            %today,
            shipments = report.shipments_created.len(),
            completed = report.requests_completed,
            "daily tick finished"
        );
        Ok(report)
    }

    /// Sends the pickup notices for one vehicle and commits the items whose
    /// pickup went through. Returns the delivery notices for those items.
    async fn dispatch_shipment(
        &self,
        shipment: &ShipmentPlan,
        today: NaiveDate,
        report: &mut DayReport,
    ) -> Vec<LogisticsNotification> {
        let vehicle_id = shipment.vehicle.id();
        let mut item_ids = Vec::new();
        let mut deliveries = Vec::new();
        for item in &shipment.items {
            let pickup = LogisticsNotification::pickup(item);
            let delivery = LogisticsNotification::delivery(item);
            match self
                .inner
                .dispatcher
                .dispatch_pickup(&pickup, &delivery, today)
                .await
            {
                Ok(DispatchOutcome::Delivered { .. }) => {
                    item_ids.push(item.item_id);
                    deliveries.push(delivery);
                }
                Ok(DispatchOutcome::Queued { reason, .. }) => {
                    warn!(vehicle_id, item_id = item.item_id, %reason, "pickup notice failed");
                    report.pickups_failed += 1;
                }
                Err(err) => {
                    error!(vehicle_id, item_id = item.item_id, %err, "pickup notice failed");
                    report.pickups_failed += 1;
                }
            }
        }
        if item_ids.is_empty() {
            debug!(vehicle_id, "no items to commit");
            return Vec::new();
        }
        match self
            .inner
            .shipments
            .create_shipment(vehicle_id, today, &item_ids)
            .await
        {
            Ok(shipment_id) => {
                debug!(vehicle_id, shipment_id, items = item_ids.len(), "shipment committed");
                report.shipments_created.push(shipment_id);
                deliveries
            }
            Err(err) => {
                error!(vehicle_id, %err, "shipment commit failed");
                report.commit_failures += 1;
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clients::{LoopbackBank, LoopbackVendor, ScriptedTransport};
    use crate::clock::ManualWallClock;
    use crate::config::AutonomyConfig;
    use crate::store::InMemoryStore;
    use bulk_planning::{
        CapacityType, CompanyRef, PaymentStatus, PickupRequest, PickupRequestItem, Vehicle,
        VehicleType,
    };

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2050, 1, day).unwrap()
    }

    fn medium_truck(id: i64) -> Vehicle {
        Vehicle {
            id,
            active: true,
            disabled_date: None,
            purchase_date: NaiveDate::from_ymd_opt(2049, 12, 31).unwrap(),
            daily_operational_cost: 300.0,
            vehicle_type: VehicleType {
                name: "medium_truck".into(),
                capacity_type: CapacityType::Unit,
                maximum_capacity: 2000,
                max_pickups_per_day: 5,
                max_dropoffs_per_day: 5,
            },
        }
    }

    fn unit_request(id: i64, origin_url: &str, quantity: u64) -> PickupRequest {
        PickupRequest {
            id,
            requesting_company: CompanyRef::new("pear", "https://pear.example"),
            origin_company: CompanyRef::new(format!("supplier-{id}"), origin_url),
            destination_company: CompanyRef::new("pear", "https://pear.example"),
            original_external_order_id: format!("ext-{id}"),
            cost: 100.0,
            request_date: date(1),
            payment_status: PaymentStatus::Paid,
            payment_date: Some(date(1)),
            completion_date: None,
            items: vec![PickupRequestItem {
                id: id * 10,
                name: "cases".into(),
                quantity,
                capacity_type: CapacityType::Unit,
                shipment_id: None,
            }],
        }
    }

    fn orchestrator(store: &Arc<InMemoryStore>, transport: &Arc<ScriptedTransport>) -> AutonomyOrchestrator {
        let orchestrator = AutonomyOrchestrator::builder(AutonomyConfig::default())
            .wall_clock(Arc::new(ManualWallClock::new(0)))
            .store(store.clone())
            .transport(transport.clone())
            .bank(Arc::new(LoopbackBank::with_existing_account("ACC-1", 10.0)))
            .vendor(Arc::new(LoopbackVendor::standard()))
            .build()
            .unwrap();
        orchestrator.inner.clock.initialize(0);
        orchestrator
    }

    #[tokio::test(start_paused = true)]
    async fn one_failed_pickup_leaves_siblings_on_board() {
        let store = Arc::new(InMemoryStore::new());
        store.add_vehicle(medium_truck(1));
        store.add_request(unit_request(1, "https://good.example", 100));
        store.add_request(unit_request(2, "https://down.example", 100));
        let transport = Arc::new(ScriptedTransport::new());
        transport.fail_url("https://down.example/logistics");
        transport.fail_url("https://pear.example/logistics");
        let orchestrator = orchestrator(&store, &transport);

        let report = orchestrator.run_day(1, date(1), false).await.unwrap();
        assert_eq!(report.plans, 1);
        assert_eq!(report.items_planned, 2);
        assert_eq!(report.pickups_failed, 1);
        assert_eq!(store.shipments()[0].item_ids, vec![10]);
        assert_eq!(report.requests_completed, 1);
        // fresh delivery for request 1 and the queued one for request 2 both fail
        assert_eq!(report.deliveries_sent, 0);
        assert_eq!(report.notifications_queued, 2);
        let mut queued: Vec<_> = store.queued().iter().map(|row| row.pickup_request_id).collect();
        queued.sort_unstable();
        assert_eq!(queued, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn commit_failure_is_isolated_per_vehicle() {
        let store = Arc::new(InMemoryStore::new());
        store.add_vehicle(medium_truck(1));
        store.add_request(unit_request(1, "https://good.example", 100));
        let transport = Arc::new(ScriptedTransport::new());
        let orchestrator = orchestrator(&store, &transport);

        let plan = orchestrator.plan_for(date(1)).await.unwrap();
        let mut shipment = plan.plans[0].clone();
        shipment.vehicle.vehicle.id = 99;
        let mut report = DayReport::new(date(1));
        let deliveries = orchestrator.dispatch_shipment(&shipment, date(1), &mut report).await;
        assert!(deliveries.is_empty());
        assert_eq!(report.commit_failures, 1);
        assert!(store.shipments().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn queued_retries_go_out_with_the_evening_batch() {
        let store = Arc::new(InMemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());
        let orchestrator = orchestrator(&store, &transport);
        transport.fail_url("https://pear.example/logistics");
        let request = unit_request(5, "https://good.example", 10);
        let item = bulk_planning::PlannedItem::new(&request, &request.items[0]);
        orchestrator
            .inner
            .dispatcher
            .dispatch(&LogisticsNotification::delivery(&item), DispatchOrigin::Fresh, date(1))
            .await
            .unwrap();
        assert_eq!(store.queued().len(), 1);

        transport.heal();
        let report = orchestrator.run_day(1, date(2), false).await.unwrap();
        assert_eq!(report.deliveries_sent, 1);
        assert!(store.queued().is_empty());
        assert_eq!(report.funds, Some(10.0));
    }
}
