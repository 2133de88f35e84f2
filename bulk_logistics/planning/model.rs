use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Vehicle identifier.
pub type VehicleId = i64;
/// Pickup request identifier.
pub type PickupRequestId = i64;
/// Pickup request item identifier.
pub type PickupRequestItemId = i64;
/// Shipment identifier.
pub type ShipmentId = i64;

/// How a vehicle's capacity and an item's quantity are measured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CapacityType {
    /// Kilograms.
    Weight,
    /// Discrete units.
    Unit,
}

impl CapacityType {
    /// Parses the measurement label used on incoming requests (`KG` or `UNIT`).
    #[must_use]
    pub fn from_measurement(label: &str) -> Option<Self> {
        match label {
            "KG" => Some(Self::Weight),
            "UNIT" => Some(Self::Unit),
            _ => None,
        }
    }

    /// Measurement label for this capacity type.
    #[must_use]
    pub const fn measurement(self) -> &'static str {
        match self {
            Self::Weight => "KG",
            Self::Unit => "UNIT",
        }
    }
}

/// Static characteristics shared by every vehicle of a type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VehicleType {
    /// Type name (`large_truck`, `medium_truck`, `small_truck`).
    pub name: String,
    /// Capacity measurement.
    pub capacity_type: CapacityType,
    /// Maximum load.
    pub maximum_capacity: u64,
    /// Distinct origin companies a vehicle may visit per day.
    pub max_pickups_per_day: u32,
    /// Distinct destination companies a vehicle may visit per day.
    pub max_dropoffs_per_day: u32,
}

/// A fleet vehicle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    /// Identifier.
    pub id: VehicleId,
    /// Whether the vehicle may be planned.
    pub active: bool,
    /// Simulated date the vehicle was disabled.
    #[serde(default)]
    pub disabled_date: Option<NaiveDate>,
    /// Simulated purchase date.
    pub purchase_date: NaiveDate,
    /// Operating cost per simulated day.
    pub daily_operational_cost: f64,
    /// Vehicle type.
    pub vehicle_type: VehicleType,
}

impl Vehicle {
    /// Type name shortcut.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.vehicle_type.name
    }
}

/// Company reference carried on requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanyRef {
    /// Company name.
    pub name: String,
    /// Base URL receiving logistics notifications.
    #[serde(default)]
    pub notification_url: String,
}

impl CompanyRef {
    /// Creates a company reference.
    #[must_use]
    pub fn new(name: impl Into<String>, notification_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notification_url: notification_url.into(),
        }
    }
}

/// Payment state of a pickup request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// Awaiting payment.
    Pending,
    /// Paid in full.
    Paid,
}

/// A line item of a pickup request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PickupRequestItem {
    /// Identifier.
    pub id: PickupRequestItemId,
    /// Item name.
    pub name: String,
    /// Quantity in the item's capacity type.
    pub quantity: u64,
    /// Capacity measurement.
    pub capacity_type: CapacityType,
    /// Shipment carrying the item, once assigned.
    #[serde(default)]
    pub shipment_id: Option<ShipmentId>,
}

impl PickupRequestItem {
    /// Whether the item is already on a shipment.
    #[must_use]
    pub const fn is_shipped(&self) -> bool {
        self.shipment_id.is_some()
    }
}

/// A pickup request with its ordered items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PickupRequest {
    /// Identifier.
    pub id: PickupRequestId,
    /// Company that placed the request.
    pub requesting_company: CompanyRef,
    /// Company the goods are collected from.
    pub origin_company: CompanyRef,
    /// Company the goods are delivered to.
    pub destination_company: CompanyRef,
    /// Order id on the requesting company's side.
    pub original_external_order_id: String,
    /// Quoted cost.
    pub cost: f64,
    /// Simulated date the request was placed.
    pub request_date: NaiveDate,
    /// Payment state.
    pub payment_status: PaymentStatus,
    /// Simulated date payment arrived.
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Simulated date the last item shipped.
    #[serde(default)]
    pub completion_date: Option<NaiveDate>,
    /// Ordered items.
    pub items: Vec<PickupRequestItem>,
}

impl PickupRequest {
    /// Items still waiting for a shipment.
    pub fn unshipped_items(&self) -> impl Iterator<Item = &PickupRequestItem> {
        self.items.iter().filter(|item| !item.is_shipped())
    }

    /// Whether every item bears a shipment reference.
    #[must_use]
    pub fn is_fully_shipped(&self) -> bool {
        self.items.iter().all(PickupRequestItem::is_shipped)
    }

    /// Whether the request is paid, not completed and has work left.
    #[must_use]
    pub fn is_awaiting_shipment(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
            && self.completion_date.is_none()
            && self.unshipped_items().next().is_some()
    }
}

/// Sorts requests into planning priority: payment date, then request date, ascending.
pub fn sort_by_priority(requests: &mut [PickupRequest]) {
    requests.sort_by_key(|request| {
        (
            request.payment_date.is_none(),
            request.payment_date,
            request.request_date,
        )
    });
}
