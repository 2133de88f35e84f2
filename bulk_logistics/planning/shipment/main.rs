use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{
    CapacityType, CompanyRef, PickupRequest, PickupRequestId, PickupRequestItem,
    PickupRequestItemId, Vehicle, VehicleId,
};

/// Vehicle allocation counters and first-fit search.
pub mod fleet;

pub use fleet::PlannableVehicle;

/// A request item as handed to a vehicle, with the routing data dispatch needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedItem {
    /// Owning request.
    pub request_id: PickupRequestId,
    /// Item identifier.
    pub item_id: PickupRequestItemId,
    /// Item name.
    pub name: String,
    /// Quantity.
    pub quantity: u64,
    /// Capacity measurement.
    pub capacity_type: CapacityType,
    /// Company the item is collected from.
    pub origin: CompanyRef,
    /// Company the item is delivered to.
    pub destination: CompanyRef,
    /// Order id on the requesting company's side.
    pub original_external_order_id: String,
}

impl PlannedItem {
    /// Builds the planned view of a request item.
    #[must_use]
    pub fn new(request: &PickupRequest, item: &PickupRequestItem) -> Self {
        Self {
            request_id: request.id,
            item_id: item.id,
            name: item.name.clone(),
            quantity: item.quantity,
            capacity_type: item.capacity_type,
            origin: request.origin_company.clone(),
            destination: request.destination_company.clone(),
            original_external_order_id: request.original_external_order_id.clone(),
        }
    }
}

/// Items assigned to one vehicle for the day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShipmentPlan {
    /// Vehicle with its end-of-planning counters.
    pub vehicle: PlannableVehicle,
    /// Items in assignment order.
    pub items: Vec<PlannedItem>,
    /// Origin companies touched.
    pub origin_company_names: Vec<String>,
    /// Destination companies touched.
    pub destination_company_names: Vec<String>,
}

impl ShipmentPlan {
    fn new(vehicle: PlannableVehicle, items: Vec<PlannedItem>) -> Self {
        Self {
            origin_company_names: vehicle.origins_visited.iter().cloned().collect(),
            destination_company_names: vehicle.destinations_visited.iter().cloned().collect(),
            vehicle,
            items,
        }
    }

    /// Total quantity loaded.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Result of one planning run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyPlan {
    /// Shipment plans in first-use order of their vehicles.
    pub plans: Vec<ShipmentPlan>,
    /// Requests placed whole in the first pass, including requests with
    /// nothing left to ship.
    pub planned_request_ids: Vec<PickupRequestId>,
}

impl DailyPlan {
    /// Whether nothing was assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Total quantity across every plan.
    #[must_use]
    pub fn total_assigned_quantity(&self) -> u64 {
        self.plans.iter().map(ShipmentPlan::total_quantity).sum()
    }

    /// Number of items assigned across every plan.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.plans.iter().map(|plan| plan.items.len()).sum()
    }
}

/// Two-pass first-fit planner assigning unshipped items to vehicles.
///
/// The first pass places whole requests or nothing; the second places
/// leftover items one by one. Requests are taken in the order given, vehicles
/// are searched in the order given.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShipmentPlanner;

impl ShipmentPlanner {
    /// Creates a planner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Plans the day for the given requests (priority order) and available vehicles.
    #[must_use]
    pub fn plan(&self, requests: &[PickupRequest], vehicles: &[Vehicle]) -> DailyPlan {
        let mut fleet: Vec<PlannableVehicle> =
            vehicles.iter().cloned().map(PlannableVehicle::new).collect();
        let mut assignments: IndexMap<VehicleId, Vec<PlannedItem>> = IndexMap::new();
        let mut planned: IndexSet<PickupRequestId> = IndexSet::new();

        for request in requests {
            let Some((scratch, placed)) = fit_whole_request(&fleet, request) else {
                debug!(request_id = request.id, "request does not fit whole, deferring to pass 2");
                continue;
            };
            fleet = scratch;
            for (vehicle_id, items) in placed {
                assignments.entry(vehicle_id).or_default().extend(items);
            }
            planned.insert(request.id);
        }

        let leftovers = requests
            .iter()
            .filter(|request| !planned.contains(&request.id))
            .flat_map(|request| {
                request
                    .unshipped_items()
                    .map(move |item| PlannedItem::new(request, item))
            });
        for item in leftovers {
            match fleet::first_fit(&mut fleet, &item) {
                Some(vehicle_id) => assignments.entry(vehicle_id).or_default().push(item),
                None => debug!(
                    request_id = item.request_id,
                    item_id = item.item_id,
                    "no vehicle for item today"
                ),
            }
        }

        let plans = assignments
            .into_iter()
            .filter_map(|(vehicle_id, items)| {
                let vehicle = fleet.iter().find(|v| v.id() == vehicle_id)?.clone();
                Some(ShipmentPlan::new(vehicle, items))
            })
            .collect();
        DailyPlan {
            plans,
            planned_request_ids: planned.into_iter().collect(),
        }
    }
}

type Placement = (Vec<PlannableVehicle>, IndexMap<VehicleId, Vec<PlannedItem>>);

/// Dry-runs every unshipped item of the request on a copy of the fleet.
///
/// A request with nothing left to ship fits trivially.
fn fit_whole_request(fleet: &[PlannableVehicle], request: &PickupRequest) -> Option<Placement> {
    let mut scratch = fleet.to_vec();
    let mut placed: IndexMap<VehicleId, Vec<PlannedItem>> = IndexMap::new();
    for item in request.unshipped_items() {
        let item = PlannedItem::new(request, item);
        let vehicle_id = fleet::first_fit(&mut scratch, &item)?;
        placed.entry(vehicle_id).or_default().push(item);
    }
    Some((scratch, placed))
}
