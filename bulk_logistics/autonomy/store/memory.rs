use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bulk_planning::{
    model::sort_by_priority, CapacityType, PickupRequest, PickupRequestId, PickupRequestItemId,
    ShipmentId, Vehicle, VehicleId, VehicleType,
};
use chrono::NaiveDate;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{
    CompanyStore, FleetStore, NewVehicle, NotificationQueueStore, QueueStatus,
    QueuedNotification, RequestStore, ShipmentStore, StoreError,
};
use crate::dispatch::LogisticsNotification;

/// A committed shipment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShipmentRecord {
    /// Identifier.
    pub id: ShipmentId,
    /// Carrying vehicle.
    pub vehicle_id: VehicleId,
    /// Simulated dispatch date.
    pub dispatch_date: NaiveDate,
    /// Items on board.
    pub item_ids: Vec<PickupRequestItemId>,
}

#[derive(Debug, Default)]
struct Tables {
    requests: Vec<PickupRequest>,
    vehicles: Vec<Vehicle>,
    vehicle_types: IndexMap<String, VehicleType>,
    shipments: Vec<ShipmentRecord>,
    queue: Vec<QueuedNotification>,
    bank_accounts: IndexMap<String, String>,
    next_vehicle_id: VehicleId,
    next_shipment_id: ShipmentId,
    next_queue_id: i64,
}

/// The standard vehicle types: one weight class and two unit classes.
#[must_use]
pub fn standard_vehicle_types() -> Vec<VehicleType> {
    let kind = |name: &str, capacity_type, maximum_capacity, stops| VehicleType {
        name: name.into(),
        capacity_type,
        maximum_capacity,
        max_pickups_per_day: stops,
        max_dropoffs_per_day: stops,
    };
    vec![
        kind("large_truck", CapacityType::Weight, 5000, 1),
        kind("medium_truck", CapacityType::Unit, 2000, 5),
        kind("small_truck", CapacityType::Unit, 500, 10),
    ]
}

/// Store keeping every table in process memory.
///
/// Vehicles become available the day after their purchase date.
#[derive(Debug)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    planning_fetches: AtomicUsize,
    status_updates: AtomicUsize,
    reject_vehicle_inserts: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store knowing the standard vehicle types.
    #[must_use]
    pub fn new() -> Self {
        let tables = Tables {
            vehicle_types: standard_vehicle_types()
                .into_iter()
                .map(|kind| (kind.name.clone(), kind))
                .collect(),
            next_vehicle_id: 1,
            next_shipment_id: 1,
            next_queue_id: 1,
            ..Tables::default()
        };
        Self {
            tables: Mutex::new(tables),
            planning_fetches: AtomicUsize::new(0),
            status_updates: AtomicUsize::new(0),
            reject_vehicle_inserts: AtomicBool::new(false),
        }
    }

    /// Adds a pickup request.
    pub fn add_request(&self, request: PickupRequest) {
        self.tables.lock().requests.push(request);
    }

    /// Adds a vehicle as-is, keeping its id.
    pub fn add_vehicle(&self, vehicle: Vehicle) {
        let mut tables = self.tables.lock();
        tables.next_vehicle_id = tables.next_vehicle_id.max(vehicle.id + 1);
        tables.vehicles.push(vehicle);
    }

    /// Makes vehicle inserts fail.
    pub fn reject_vehicle_inserts(&self, reject: bool) {
        self.reject_vehicle_inserts.store(reject, Ordering::SeqCst);
    }

    /// Current requests.
    #[must_use]
    pub fn requests(&self) -> Vec<PickupRequest> {
        self.tables.lock().requests.clone()
    }

    /// Current vehicles.
    #[must_use]
    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.tables.lock().vehicles.clone()
    }

    /// Committed shipments.
    #[must_use]
    pub fn shipments(&self) -> Vec<ShipmentRecord> {
        self.tables.lock().shipments.clone()
    }

    /// Retry ledger rows.
    #[must_use]
    pub fn queued(&self) -> Vec<QueuedNotification> {
        self.tables.lock().queue.clone()
    }

    /// Bank account recorded for a company.
    #[must_use]
    pub fn bank_account(&self, company_name: &str) -> Option<String> {
        self.tables.lock().bank_accounts.get(company_name).cloned()
    }

    /// Times the planning query ran.
    #[must_use]
    pub fn planning_fetches(&self) -> usize {
        self.planning_fetches.load(Ordering::SeqCst)
    }

    /// Vehicle status updates issued.
    #[must_use]
    pub fn status_updates(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn find_paid_and_unshipped(&self) -> Result<Vec<PickupRequest>, StoreError> {
        self.planning_fetches.fetch_add(1, Ordering::SeqCst);
        let mut open: Vec<PickupRequest> = self
            .tables
            .lock()
            .requests
            .iter()
            .filter(|request| request.is_awaiting_shipment())
            .cloned()
            .collect();
        sort_by_priority(&mut open);
        Ok(open)
    }

    async fn update_completion_date(
        &self,
        id: PickupRequestId,
        date: NaiveDate,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let request = tables
            .requests
            .iter_mut()
            .find(|request| request.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "pickup request",
                id: id.to_string(),
            })?;
        request.completion_date = Some(date);
        Ok(())
    }

    async fn mark_completed(&self, date: NaiveDate) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock();
        let mut completed = 0;
        for request in &mut tables.requests {
            if request.completion_date.is_none()
                && !request.items.is_empty()
                && request.is_fully_shipped()
            {
                request.completion_date = Some(date);
                completed += 1;
            }
        }
        Ok(completed)
    }
}

#[async_trait]
impl FleetStore for InMemoryStore {
    async fn find_available_vehicles(&self, date: NaiveDate) -> Result<Vec<Vehicle>, StoreError> {
        Ok(self
            .tables
            .lock()
            .vehicles
            .iter()
            .filter(|vehicle| vehicle.active && vehicle.purchase_date < date)
            .cloned()
            .collect())
    }

    async fn all_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        Ok(self.vehicles())
    }

    async fn update_vehicle_status(
        &self,
        id: VehicleId,
        active: bool,
        disabled_date: Option<NaiveDate>,
    ) -> Result<Vehicle, StoreError> {
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock();
        let vehicle = tables
            .vehicles
            .iter_mut()
            .find(|vehicle| vehicle.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "vehicle",
                id: id.to_string(),
            })?;
        vehicle.active = active;
        vehicle.disabled_date = disabled_date;
        Ok(vehicle.clone())
    }

    async fn insert_vehicle(&self, new: NewVehicle) -> Result<Vehicle, StoreError> {
        if self.reject_vehicle_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("vehicle table is read-only".into()));
        }
        let mut tables = self.tables.lock();
        let mut vehicle_type = tables
            .vehicle_types
            .get(&new.type_name)
            .cloned()
            .ok_or_else(|| StoreError::Constraint(format!("unknown vehicle type {}", new.type_name)))?;
        vehicle_type.maximum_capacity = new.load_capacity;
        let vehicle = Vehicle {
            id: tables.next_vehicle_id,
            active: true,
            disabled_date: None,
            purchase_date: new.purchase_date,
            daily_operational_cost: new.daily_operational_cost,
            vehicle_type,
        };
        tables.next_vehicle_id += 1;
        tables.vehicles.push(vehicle.clone());
        Ok(vehicle)
    }
}

#[async_trait]
impl ShipmentStore for InMemoryStore {
    async fn create_shipment(
        &self,
        vehicle_id: VehicleId,
        dispatch_date: NaiveDate,
        item_ids: &[PickupRequestItemId],
    ) -> Result<ShipmentId, StoreError> {
        let mut tables = self.tables.lock();
        if !tables.vehicles.iter().any(|vehicle| vehicle.id == vehicle_id) {
            return Err(StoreError::NotFound {
                entity: "vehicle",
                id: vehicle_id.to_string(),
            });
        }
        for item_id in item_ids {
            let item = tables
                .requests
                .iter()
                .flat_map(|request| request.items.iter())
                .find(|item| item.id == *item_id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "pickup request item",
                    id: item_id.to_string(),
                })?;
            if item.is_shipped() {
                return Err(StoreError::Constraint(format!("item {item_id} is already shipped")));
            }
        }
        let shipment_id = tables.next_shipment_id;
        tables.next_shipment_id += 1;
        for item in tables
            .requests
            .iter_mut()
            .flat_map(|request| request.items.iter_mut())
            .filter(|item| item_ids.contains(&item.id))
        {
            item.shipment_id = Some(shipment_id);
        }
        tables.shipments.push(ShipmentRecord {
            id: shipment_id,
            vehicle_id,
            dispatch_date,
            item_ids: item_ids.to_vec(),
        });
        Ok(shipment_id)
    }
}

#[async_trait]
impl NotificationQueueStore for InMemoryStore {
    async fn list_queued(&self) -> Result<Vec<QueuedNotification>, StoreError> {
        let mut rows: Vec<QueuedNotification> = self
            .queued()
            .into_iter()
            .filter(|row| row.status == QueueStatus::Queued)
            .collect();
        rows.sort_by_key(|row| (row.created_at, row.id));
        Ok(rows)
    }

    async fn upsert_failed(
        &self,
        notification: &LogisticsNotification,
        now: NaiveDate,
    ) -> Result<QueuedNotification, StoreError> {
        let payload = serde_json::to_value(notification)
            .map_err(|err| StoreError::Constraint(err.to_string()))?;
        let mut tables = self.tables.lock();
        if let Some(row) = tables.queue.iter_mut().find(|row| {
            row.pickup_request_id == notification.pickup_request_id
                && row.status == QueueStatus::Queued
        }) {
            row.retry_count += 1;
            row.last_attempt_at = now;
            return Ok(row.clone());
        }
        let row = QueuedNotification {
            id: tables.next_queue_id,
            pickup_request_id: notification.pickup_request_id,
            payload,
            retry_count: 0,
            last_attempt_at: now,
            created_at: now,
            status: QueueStatus::Queued,
        };
        tables.next_queue_id += 1;
        tables.queue.push(row.clone());
        Ok(row)
    }

    async fn delete_by_request_id(&self, id: PickupRequestId) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        let before = tables.queue.len();
        tables.queue.retain(|row| row.pickup_request_id != id);
        Ok(tables.queue.len() != before)
    }
}

#[async_trait]
impl CompanyStore for InMemoryStore {
    async fn update_bank_account(
        &self,
        company_name: &str,
        account_number: &str,
    ) -> Result<(), StoreError> {
        self.tables
            .lock()
            .bank_accounts
            .insert(company_name.to_string(), account_number.to_string());
        Ok(())
    }
}
