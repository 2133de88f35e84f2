use std::sync::Arc;

use bulk_logging::LogLevel;
use bulk_planning::Vehicle;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    clock::SimulatedClock, errors::AutonomyError, store::FleetStore,
    telemetry::AutonomyTelemetry,
};

const NOTHING_TO_REACTIVATE: &str = "No Vehicles to activate";
const REACTIVATED: &str = "Found Vehicles to Reactivate";
const NOTHING_TO_FAIL: &str = "No vehicles to fail";
const DISABLED: &str = "Successfully Disabled Trucks";

/// Structured result of a lifecycle operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleOutcome {
    /// Whether anything changed.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Vehicles as updated.
    pub vehicles: Vec<Vehicle>,
}

impl LifecycleOutcome {
    fn unchanged(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            vehicles: Vec::new(),
        }
    }

    fn changed(message: &str, vehicles: Vec<Vehicle>) -> Self {
        Self {
            success: true,
            message: message.into(),
            vehicles,
        }
    }
}

/// Takes broken vehicles out of service and returns them after a cooldown.
#[derive(Clone)]
pub struct VehicleLifecycleManager {
    fleet: Arc<dyn FleetStore>,
    clock: Arc<SimulatedClock>,
    reactivation_delay_days: u32,
    telemetry: Option<AutonomyTelemetry>,
}

impl std::fmt::Debug for VehicleLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleLifecycleManager")
            .field("reactivation_delay_days", &self.reactivation_delay_days)
            .finish_non_exhaustive()
    }
}

impl VehicleLifecycleManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(
        fleet: Arc<dyn FleetStore>,
        clock: Arc<SimulatedClock>,
        reactivation_delay_days: u32,
    ) -> Self {
        Self {
            fleet,
            clock,
            reactivation_delay_days,
            telemetry: None,
        }
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: AutonomyTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Returns vehicles disabled at least the cooldown before `today` to service.
    pub async fn reactivate_eligible_vehicles(
        &self,
        today: NaiveDate,
    ) -> Result<LifecycleOutcome, AutonomyError> {
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(self.reactivation_delay_days)))
            .unwrap_or(today);
        let eligible: Vec<Vehicle> = self
            .fleet
            .all_vehicles()
            .await?
            .into_iter()
            .filter(|v| !v.active && v.disabled_date.is_some_and(|d| d <= cutoff))
            .collect();
        if eligible.is_empty() {
            return Ok(LifecycleOutcome::unchanged(NOTHING_TO_REACTIVATE));
        }
        let mut reactivated = Vec::with_capacity(eligible.len());
        for vehicle in eligible {
            reactivated.push(self.fleet.update_vehicle_status(vehicle.id, true, None).await?);
        }
        info!(count = reactivated.len(), %today, "vehicles reactivated");
        if let Some(tel) = &self.telemetry {
            let ids: Vec<_> = reactivated.iter().map(|v| v.id).collect();
            let _ = tel
                .event("autonomy.vehicles.reactivated", Some(today), json!({ "vehicle_ids": ids }))
                .await;
        }
        Ok(LifecycleOutcome::changed(REACTIVATED, reactivated))
    }

    /// Disables `quantity` vehicles of `type_name`, or none if fewer exist.
    pub async fn fail_vehicles(
        &self,
        type_name: &str,
        quantity: i64,
    ) -> Result<LifecycleOutcome, AutonomyError> {
        let fleet = self.fleet.all_vehicles().await?;
        let Ok(wanted) = usize::try_from(quantity) else {
            return Ok(LifecycleOutcome::unchanged(NOTHING_TO_FAIL));
        };
        if fleet.is_empty() || wanted == 0 {
            return Ok(LifecycleOutcome::unchanged(NOTHING_TO_FAIL));
        }
        let matching: Vec<&Vehicle> = fleet.iter().filter(|v| v.type_name() == type_name).collect();
        if matching.len() < wanted {
            return Ok(LifecycleOutcome::unchanged(format!(
                "Requested to fail {wanted} {type_name} vehicle(s) but only {} available",
                matching.len()
            )));
        }
        let today = self.clock.current_date_or_start();
        let mut disabled = Vec::with_capacity(wanted);
        for vehicle in matching.into_iter().take(wanted) {
            disabled.push(
                self.fleet
                    .update_vehicle_status(vehicle.id, false, Some(today))
                    .await?,
            );
        }
        if let Some(tel) = &self.telemetry {
            let payload = json!({ "type": type_name, "count": disabled.len() });
            let _ = tel.log(LogLevel::Warn, "vehicles.failed", Some(today), payload.clone());
            let _ = tel.event("autonomy.vehicles.failed", Some(today), payload).await;
        }
        Ok(LifecycleOutcome::changed(DISABLED, disabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualWallClock, SIMULATED_DAY_IN_REAL_MS};
    use crate::store::InMemoryStore;
    use bulk_planning::{CapacityType, VehicleType};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2050, 1, day).unwrap()
    }

    fn truck(id: i64, name: &str, disabled_on: Option<u32>) -> Vehicle {
        Vehicle {
            id,
            active: disabled_on.is_none(),
            disabled_date: disabled_on.map(date),
            purchase_date: date(1),
            daily_operational_cost: 500.0,
            vehicle_type: VehicleType {
                name: name.into(),
                capacity_type: CapacityType::Weight,
                maximum_capacity: 5000,
                max_pickups_per_day: 1,
                max_dropoffs_per_day: 1,
            },
        }
    }

    /// Store plus a manager whose clock reads 2050-01-`today`.
    fn setup(today: u32, vehicles: Vec<Vehicle>) -> (Arc<InMemoryStore>, VehicleLifecycleManager) {
        let store = Arc::new(InMemoryStore::new());
        for vehicle in vehicles {
            store.add_vehicle(vehicle);
        }
        let wall = Arc::new(ManualWallClock::new(0));
        let clock = Arc::new(SimulatedClock::new(wall.clone(), SIMULATED_DAY_IN_REAL_MS, date(1)));
        clock.initialize(0);
        wall.set(i64::from(today - 1) * SIMULATED_DAY_IN_REAL_MS as i64);
        let manager = VehicleLifecycleManager::new(store.clone(), clock, 2);
        (store, manager)
    }

    #[tokio::test]
    async fn reactivates_after_two_days_only() {
        let (store, manager) = setup(
            15,
            vec![truck(1, "large_truck", Some(13)), truck(2, "large_truck", Some(14))],
        );
        let outcome = manager.reactivate_eligible_vehicles(date(15)).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "Found Vehicles to Reactivate");
        assert_eq!(outcome.vehicles.len(), 1);
        let vehicles = store.vehicles();
        assert!(vehicles[0].active && vehicles[0].disabled_date.is_none());
        assert!(!vehicles[1].active);
    }

    #[tokio::test]
    async fn nothing_to_reactivate_is_not_an_error() {
        let (store, manager) = setup(3, vec![truck(1, "large_truck", None)]);
        let outcome = manager.reactivate_eligible_vehicles(date(3)).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "No Vehicles to activate");
        assert_eq!(store.status_updates(), 0);
    }

    #[tokio::test]
    async fn cutoff_follows_the_given_date_not_the_clock() {
        // clock already reads the 15th; the tick being processed is the 14th
        let (store, manager) = setup(15, vec![truck(1, "large_truck", Some(13))]);
        let outcome = manager.reactivate_eligible_vehicles(date(14)).await.unwrap();
        assert!(!outcome.success);
        assert!(!store.vehicles()[0].active);

        let outcome = manager.reactivate_eligible_vehicles(date(15)).await.unwrap();
        assert_eq!(outcome.vehicles.len(), 1);
    }

    #[tokio::test]
    async fn disables_exact_type_matches_with_today() {
        let (store, manager) = setup(
            4,
            vec![
                truck(1, "large_truck", None),
                truck(2, "Large_Truck", None),
                truck(3, "large_truck", None),
            ],
        );
        let outcome = manager.fail_vehicles("large_truck", 1).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "Successfully Disabled Trucks");
        assert_eq!(outcome.vehicles[0].id, 1);
        assert_eq!(store.vehicles()[0].disabled_date, Some(date(4)));
        assert!(store.vehicles()[1].active);
    }

    #[tokio::test]
    async fn over_request_changes_nothing() {
        let (store, manager) = setup(4, vec![truck(1, "large_truck", None), truck(2, "small_truck", None)]);
        let outcome = manager.fail_vehicles("large_truck", 3).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.message.contains('3'));
        assert!(outcome.message.contains('1'));
        assert_eq!(store.status_updates(), 0);
    }

    #[tokio::test]
    async fn empty_fleet_or_non_positive_quantity() {
        let (store, manager) = setup(4, Vec::new());
        let outcome = manager.fail_vehicles("large_truck", 1).await.unwrap();
        assert_eq!(outcome.message, "No vehicles to fail");

        let (_, manager) = setup(4, vec![truck(1, "large_truck", None)]);
        for quantity in [0, -2] {
            let outcome = manager.fail_vehicles("large_truck", quantity).await.unwrap();
            assert!(!outcome.success);
            assert_eq!(outcome.message, "No vehicles to fail");
        }
        assert_eq!(store.status_updates(), 0);
    }
}
