use async_trait::async_trait;
use bulk_planning::{
    PickupRequest, PickupRequestId, PickupRequestItemId, ShipmentId, Vehicle, VehicleId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::LogisticsNotification;

/// In-memory implementation of every store.
pub mod memory;

pub use memory::InMemoryStore;

/// Persistence failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Record kind.
        entity: &'static str,
        /// Record identifier.
        id: String,
    },
    /// Write rejected by a constraint.
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// Backend failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Vehicle to insert after a truck delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewVehicle {
    /// Vehicle type name.
    pub type_name: String,
    /// Simulated purchase date.
    pub purchase_date: NaiveDate,
    /// Operating cost per simulated day.
    pub daily_operational_cost: f64,
    /// Maximum load reported by the vendor.
    pub load_capacity: u64,
}

/// Retry ledger row status. Rows are deleted on success, so only one state exists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueStatus {
    /// Awaiting re-send.
    Queued,
}

/// A notification waiting for re-delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedNotification {
    /// Row identifier.
    pub id: i64,
    /// Request the notification belongs to.
    pub pickup_request_id: PickupRequestId,
    /// Serialized notification.
    pub payload: serde_json::Value,
    /// Failed re-sends after the first failure.
    pub retry_count: u32,
    /// Simulated date of the latest failed attempt.
    pub last_attempt_at: NaiveDate,
    /// Simulated date the row was created.
    pub created_at: NaiveDate,
    /// Row status.
    pub status: QueueStatus,
}

/// Pickup requests.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Paid, uncompleted requests with unshipped items, by payment date then request date.
    async fn find_paid_and_unshipped(&self) -> Result<Vec<PickupRequest>, StoreError>;
    /// Sets a request's completion date.
    async fn update_completion_date(
        &self,
        id: PickupRequestId,
        date: NaiveDate,
    ) -> Result<(), StoreError>;
    /// Completes every open request whose items are all shipped; returns how many.
    async fn mark_completed(&self, date: NaiveDate) -> Result<usize, StoreError>;
}

/// Fleet vehicles.
#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Vehicles that may be planned on `date`.
    async fn find_available_vehicles(&self, date: NaiveDate) -> Result<Vec<Vehicle>, StoreError>;
    /// Every vehicle with its type.
    async fn all_vehicles(&self) -> Result<Vec<Vehicle>, StoreError>;
    /// Sets the active flag and disabled date.
    async fn update_vehicle_status(
        &self,
        id: VehicleId,
        active: bool,
        disabled_date: Option<NaiveDate>,
    ) -> Result<Vehicle, StoreError>;
    /// Records a delivered vehicle.
    async fn insert_vehicle(&self, vehicle: NewVehicle) -> Result<Vehicle, StoreError>;
}

/// Shipments.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Creates a shipment for the vehicle and assigns the items to it.
    async fn create_shipment(
        &self,
        vehicle_id: VehicleId,
        dispatch_date: NaiveDate,
        item_ids: &[PickupRequestItemId],
    ) -> Result<ShipmentId, StoreError>;
}

/// Retry ledger for failed notifications.
#[async_trait]
pub trait NotificationQueueStore: Send + Sync {
    /// Queued rows, oldest first.
    async fn list_queued(&self) -> Result<Vec<QueuedNotification>, StoreError>;
    /// Bumps the queued row for the notification's request, or inserts one.
    async fn upsert_failed(
        &self,
        notification: &LogisticsNotification,
        now: NaiveDate,
    ) -> Result<QueuedNotification, StoreError>;
    /// Deletes the queued row for a request; returns whether one existed.
    async fn delete_by_request_id(&self, id: PickupRequestId) -> Result<bool, StoreError>;
}

/// Company records.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Stores the bank account number for a company.
    async fn update_bank_account(
        &self,
        company_name: &str,
        account_number: &str,
    ) -> Result<(), StoreError>;
}
