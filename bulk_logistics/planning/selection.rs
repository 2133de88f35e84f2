use serde::{Deserialize, Serialize};

use crate::model::{CapacityType, Vehicle};

/// Type name of the weight-carrying truck.
pub const LARGE_TRUCK: &str = "large_truck";
/// Type name of the bigger unit-carrying truck.
pub const MEDIUM_TRUCK: &str = "medium_truck";
/// Type name of the smaller unit-carrying truck.
pub const SMALL_TRUCK: &str = "small_truck";

/// Kilograms one large truck is quoted for.
pub const LARGE_TRUCK_LOAD: i64 = 5000;
/// Units one medium truck is quoted for.
pub const MEDIUM_TRUCK_LOAD: i64 = 2000;
/// Units one small truck is quoted for.
pub const SMALL_TRUCK_LOAD: i64 = 500;

const NO_LARGE_TRUCKS: &str = "No large trucks available.";
const NO_VEHICLES: &str = "No vehicles available to complete the request";
const UNSUPPORTED_MEASUREMENT: &str = "Unsupported measurement type.";
/// Most trips one quote may ask for.
pub const MAX_QUOTED_TRIPS: i64 = 10_000;

const NEGATIVE_QUANTITY: &str = "Item quantities must not be negative.";
const QUANTITY_TOO_LARGE: &str = "Requested quantity exceeds what the fleet can quote.";

/// Item of a request being quoted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuoteItem {
    /// Item name.
    pub name: String,
    /// Requested quantity.
    pub quantity: i64,
    /// Measurement label (`KG` or `UNIT`).
    pub measurement_type: String,
}

/// Incoming request to quote vehicles for.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuoteRequest {
    /// Items to carry.
    pub items: Vec<QuoteItem>,
}

/// Vehicles a request would need, or why none can be offered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VehicleQuote {
    /// Vehicles to use, possibly repeating one vehicle for several trips.
    Selected {
        /// Selected vehicles in trip order.
        vehicles: Vec<Vehicle>,
    },
    /// No quote possible.
    Unavailable {
        /// Diagnostic message.
        reason: String,
    },
}

impl VehicleQuote {
    fn unavailable(reason: &str) -> Self {
        Self::Unavailable {
            reason: reason.to_string(),
        }
    }

    /// Whether vehicles were selected.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Selected { .. })
    }

    /// Selected vehicles; empty when unavailable.
    #[must_use]
    pub fn vehicles(&self) -> &[Vehicle] {
        match self {
            Self::Selected { vehicles } => vehicles,
            Self::Unavailable { .. } => &[],
        }
    }

    /// Failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Selected { .. } => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

/// Quotes the trucks a new request would occupy.
///
/// The first item's measurement label decides the pool for the whole request.
/// Weight requests use large trucks in chunks of [`LARGE_TRUCK_LOAD`]; unit
/// requests take medium trucks while more than [`SMALL_TRUCK_LOAD`] units are
/// left and small trucks otherwise. Pools are reused round-robin when the
/// request needs more trips than there are trucks.
#[derive(Debug, Clone, Copy, Default)]
pub struct VehicleSelector;

impl VehicleSelector {
    /// Creates a selector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Selects vehicles for the request from the fleet.
    #[must_use]
    pub fn select(&self, request: &QuoteRequest, fleet: &[Vehicle]) -> VehicleQuote {
        let Some(capacity_type) = request
            .items
            .first()
            .and_then(|item| CapacityType::from_measurement(&item.measurement_type))
        else {
            return VehicleQuote::unavailable(UNSUPPORTED_MEASUREMENT);
        };
        if request.items.iter().any(|item| item.quantity < 0) {
            return VehicleQuote::unavailable(NEGATIVE_QUANTITY);
        }
        // smallest load per trip for the pool, so this also bounds the trip count
        let trip_load = match capacity_type {
            CapacityType::Weight => LARGE_TRUCK_LOAD,
            CapacityType::Unit => SMALL_TRUCK_LOAD,
        };
        let Some(total) = request
            .items
            .iter()
            .try_fold(0_i64, |sum, item| sum.checked_add(item.quantity))
            .filter(|total| *total <= MAX_QUOTED_TRIPS * trip_load)
        else {
            return VehicleQuote::unavailable(QUANTITY_TOO_LARGE);
        };
        match capacity_type {
            CapacityType::Weight => select_by_weight(total, fleet),
            CapacityType::Unit => select_by_units(total, fleet),
        }
    }
}

fn pool<'a>(fleet: &'a [Vehicle], type_name: &str) -> Vec<&'a Vehicle> {
    fleet.iter().filter(|v| v.type_name() == type_name).collect()
}

fn select_by_weight(total: i64, fleet: &[Vehicle]) -> VehicleQuote {
    let large = pool(fleet, LARGE_TRUCK);
    if large.is_empty() {
        return VehicleQuote::unavailable(NO_LARGE_TRUCKS);
    }
    let required = u64::try_from(total)
        .ok()
        .and_then(|total| usize::try_from(total.div_ceil(LARGE_TRUCK_LOAD.unsigned_abs())).ok())
        .unwrap_or(0);
    let vehicles = (0..required)
        .map(|trip| large[trip % large.len()].clone())
        .collect();
    VehicleQuote::Selected { vehicles }
}

fn select_by_units(total: i64, fleet: &[Vehicle]) -> VehicleQuote {
    let medium = pool(fleet, MEDIUM_TRUCK);
    let small = pool(fleet, SMALL_TRUCK);
    let (mut medium_trips, mut small_trips) = (0_usize, 0_usize);
    let mut remaining = total;
    let mut vehicles = Vec::new();
    while remaining > 0 {
        // Subsumed by the second clause; existing quotes depend on it.
        let wants_medium = remaining > MEDIUM_TRUCK_LOAD || remaining > SMALL_TRUCK_LOAD;
        if wants_medium && !medium.is_empty() {
            vehicles.push(medium[medium_trips % medium.len()].clone());
            medium_trips += 1;
            remaining -= MEDIUM_TRUCK_LOAD;
        } else if !small.is_empty() {
            vehicles.push(small[small_trips % small.len()].clone());
            small_trips += 1;
            remaining -= SMALL_TRUCK_LOAD;
        } else {
            return VehicleQuote::unavailable(NO_VEHICLES);
        }
    }
    VehicleQuote::Selected { vehicles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VehicleType;
    use chrono::NaiveDate;

    fn truck(id: i64, type_name: &str) -> Vehicle {
        let (capacity_type, capacity) = if type_name == LARGE_TRUCK {
            (CapacityType::Weight, 5000)
        } else {
            (CapacityType::Unit, 2000)
        };
        Vehicle {
            id,
            active: true,
            disabled_date: None,
            purchase_date: NaiveDate::from_ymd_opt(2050, 1, 1).unwrap(),
            daily_operational_cost: 500.0,
            vehicle_type: VehicleType {
                name: type_name.into(),
                capacity_type,
                maximum_capacity: capacity,
                max_pickups_per_day: 5,
                max_dropoffs_per_day: 5,
            },
        }
    }

    fn quote(items: &[(i64, &str)]) -> QuoteRequest {
        QuoteRequest {
            items: items
                .iter()
                .map(|(quantity, measurement)| QuoteItem {
                    name: "copper".into(),
                    quantity: *quantity,
                    measurement_type: (*measurement).into(),
                })
                .collect(),
        }
    }

    fn ids(result: &VehicleQuote) -> Vec<i64> {
        result.vehicles().iter().map(|v| v.id).collect()
    }

    fn mixed_fleet() -> Vec<Vehicle> {
        vec![
            truck(1, LARGE_TRUCK),
            truck(2, LARGE_TRUCK),
            truck(3, MEDIUM_TRUCK),
            truck(4, MEDIUM_TRUCK),
            truck(5, SMALL_TRUCK),
        ]
    }

    #[test]
    fn weight_uses_one_large_truck_per_five_tonnes() {
        let selector = VehicleSelector::new();
        let fleet = mixed_fleet();
        assert_eq!(ids(&selector.select(&quote(&[(3000, "KG")]), &fleet)), vec![1]);
        assert_eq!(ids(&selector.select(&quote(&[(8000, "KG")]), &fleet)), vec![1, 2]);
    }

    #[test]
    fn weight_cycles_through_the_large_pool() {
        let selector = VehicleSelector::new();
        let single = vec![truck(9, LARGE_TRUCK)];
        assert_eq!(ids(&selector.select(&quote(&[(12000, "KG")]), &single)), vec![9, 9, 9]);
        assert_eq!(
            ids(&selector.select(&quote(&[(15000, "KG")]), &mixed_fleet())),
            vec![1, 2, 1]
        );
    }

    #[test]
    fn weight_without_large_trucks_is_unavailable() {
        let result =
            VehicleSelector::new().select(&quote(&[(100, "KG")]), &[truck(3, MEDIUM_TRUCK)]);
        assert_eq!(result.reason(), Some("No large trucks available."));
    }

    #[test]
    fn units_prefer_medium_trucks() {
        let selector = VehicleSelector::new();
        let fleet = mixed_fleet();
        assert_eq!(ids(&selector.select(&quote(&[(2500, "UNIT")]), &fleet)), vec![3, 5]);
        assert_eq!(ids(&selector.select(&quote(&[(1000, "UNIT")]), &fleet)), vec![3]);
        assert_eq!(ids(&selector.select(&quote(&[(300, "UNIT")]), &fleet)), vec![5]);
        assert_eq!(ids(&selector.select(&quote(&[(4500, "UNIT")]), &fleet)), vec![3, 4, 5]);
    }

    #[test]
    fn units_fall_back_to_small_trucks_and_cycle() {
        let fleet = vec![truck(5, SMALL_TRUCK), truck(6, SMALL_TRUCK)];
        assert_eq!(
            ids(&VehicleSelector::new().select(&quote(&[(1200, "UNIT")]), &fleet)),
            vec![5, 6, 5]
        );
    }

    #[test]
    fn units_without_unit_trucks_are_unavailable() {
        let selector = VehicleSelector::new();
        let expected = Some("No vehicles available to complete the request");
        assert_eq!(selector.select(&quote(&[(100, "UNIT")]), &[]).reason(), expected);
        assert_eq!(
            selector.select(&quote(&[(100, "UNIT")]), &[truck(1, LARGE_TRUCK)]).reason(),
            expected
        );
    }

    #[test]
    fn unsupported_measurements() {
        let selector = VehicleSelector::new();
        let expected = Some("Unsupported measurement type.");
        let fleet = mixed_fleet();
        assert_eq!(selector.select(&QuoteRequest::default(), &fleet).reason(), expected);
        assert_eq!(selector.select(&quote(&[(10, "LITRE")]), &fleet).reason(), expected);
    }

    #[test]
    fn first_item_decides_measurement() {
        let request = quote(&[(3000, "KG"), (2000, "UNIT")]);
        let result = VehicleSelector::new().select(&request, &mixed_fleet());
        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn zero_quantity_needs_no_vehicles() {
        let result = VehicleSelector::new().select(&quote(&[(0, "UNIT")]), &mixed_fleet());
        assert!(result.is_available());
        assert!(result.vehicles().is_empty());
    }

    #[test]
    fn negative_quantities_are_rejected() {
        let request = quote(&[(500, "UNIT"), (-700, "UNIT")]);
        let result = VehicleSelector::new().select(&request, &mixed_fleet());
        assert_eq!(result.reason(), Some("Item quantities must not be negative."));
    }

    #[test]
    fn oversized_totals_are_rejected() {
        let selector = VehicleSelector::new();
        let expected = Some("Requested quantity exceeds what the fleet can quote.");
        let half = i64::MAX / 2 + 1;
        let overflowing = quote(&[(half, "UNIT"), (half, "UNIT")]);
        assert_eq!(selector.select(&overflowing, &mixed_fleet()).reason(), expected);
        let single = vec![truck(9, LARGE_TRUCK)];
        assert_eq!(selector.select(&quote(&[(i64::MAX, "KG")]), &single).reason(), expected);
        assert_eq!(
            selector.select(&quote(&[(1_000_000_000_000, "KG")]), &single).reason(),
            expected
        );
    }

    #[test]
    fn largest_quotable_total_fits_the_trip_bound() {
        let single = vec![truck(9, LARGE_TRUCK)];
        let total = MAX_QUOTED_TRIPS * LARGE_TRUCK_LOAD;
        let result = VehicleSelector::new().select(&quote(&[(total, "KG")]), &single);
        assert_eq!(result.vehicles().len(), 10_000);
        let units = VehicleSelector::new()
            .select(&quote(&[(MAX_QUOTED_TRIPS * SMALL_TRUCK_LOAD + 1, "UNIT")]), &mixed_fleet());
        assert!(!units.is_available());
    }
}
