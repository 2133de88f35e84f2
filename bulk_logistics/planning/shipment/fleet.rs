use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::PlannedItem;
use crate::model::{Vehicle, VehicleId};

/// A vehicle decorated with the allocation counters of one planning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannableVehicle {
    /// Underlying vehicle.
    pub vehicle: Vehicle,
    /// Capacity left today.
    pub capacity_remaining: u64,
    /// Distinct origins assigned today.
    pub pickups_assigned_today: u32,
    /// Distinct destinations assigned today.
    pub dropoffs_assigned_today: u32,
    /// Origin company names visited today, in first-visit order.
    pub origins_visited: IndexSet<String>,
    /// Destination company names visited today, in first-visit order.
    pub destinations_visited: IndexSet<String>,
}

impl PlannableVehicle {
    /// Wraps a vehicle with fresh counters.
    #[must_use]
    pub fn new(vehicle: Vehicle) -> Self {
        Self {
            capacity_remaining: vehicle.vehicle_type.maximum_capacity,
            vehicle,
            pickups_assigned_today: 0,
            dropoffs_assigned_today: 0,
            origins_visited: IndexSet::new(),
            destinations_visited: IndexSet::new(),
        }
    }

    /// Vehicle identifier.
    #[must_use]
    pub const fn id(&self) -> VehicleId {
        self.vehicle.id
    }

    /// Whether the item may be loaded without breaking capacity or quota.
    #[must_use]
    pub fn can_carry(&self, item: &PlannedItem) -> bool {
        let kind = &self.vehicle.vehicle_type;
        if kind.capacity_type != item.capacity_type {
            return false;
        }
        if self.capacity_remaining == 0 || self.capacity_remaining < item.quantity {
            return false;
        }
        let origin_ok = self.origins_visited.contains(&item.origin.name)
            || self.pickups_assigned_today < kind.max_pickups_per_day;
        let destination_ok = self.destinations_visited.contains(&item.destination.name)
            || self.dropoffs_assigned_today < kind.max_dropoffs_per_day;
        origin_ok && destination_ok
    }

    /// Books the item against the counters. Callers check [`Self::can_carry`] first.
    pub fn load(&mut self, item: &PlannedItem) {
        self.capacity_remaining = self.capacity_remaining.saturating_sub(item.quantity);
        if self.origins_visited.insert(item.origin.name.clone()) {
            self.pickups_assigned_today += 1;
        }
        if self.destinations_visited.insert(item.destination.name.clone()) {
            self.dropoffs_assigned_today += 1;
        }
    }
}

/// Places the item on the first vehicle able to carry it, returning that vehicle's id.
pub fn first_fit(fleet: &mut [PlannableVehicle], item: &PlannedItem) -> Option<VehicleId> {
    let slot = fleet.iter_mut().find(|candidate| candidate.can_carry(item))?;
    slot.load(item);
    Some(slot.id())
}
