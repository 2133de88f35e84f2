use crate::errors::PlanningError;
use crate::model::Vehicle;
use crate::selection::{QuoteRequest, VehicleSelector, LARGE_TRUCK, MEDIUM_TRUCK, SMALL_TRUCK};

/// Days a monthly loan instalment is spread over.
const DAYS_PER_MONTH: f64 = 30.0;

/// Prices a delivery from the vehicles it would occupy.
///
/// A large truck is booked for the whole day, so it carries its full running
/// cost and one day of loan repayment. Medium and small trucks share their day
/// between as many pickups as their type allows.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryCostCalculator {
    selector: VehicleSelector,
    monthly_loan_repayment: f64,
    profit_margin: f64,
}

impl DeliveryCostCalculator {
    /// Creates a calculator with the given loan instalment and margin.
    #[must_use]
    pub const fn new(monthly_loan_repayment: f64, profit_margin: f64) -> Self {
        Self {
            selector: VehicleSelector::new(),
            monthly_loan_repayment,
            profit_margin,
        }
    }

    /// Price of the request, or 0 when no vehicles can be quoted.
    pub fn quote(&self, request: &QuoteRequest, fleet: &[Vehicle]) -> Result<u64, PlanningError> {
        let selection = self.selector.select(request, fleet);
        if !selection.is_available() {
            return Ok(0);
        }
        let daily_loan = self.monthly_loan_repayment / DAYS_PER_MONTH;
        let mut base = 0.0;
        for vehicle in selection.vehicles() {
            base += match vehicle.type_name() {
                LARGE_TRUCK => vehicle.daily_operational_cost + daily_loan,
                MEDIUM_TRUCK | SMALL_TRUCK => {
                    let pickups = vehicle.vehicle_type.max_pickups_per_day;
                    if pickups == 0 {
                        return Err(PlanningError::NoPickupCapacity(vehicle.type_name().into()));
                    }
                    (vehicle.daily_operational_cost + daily_loan) / f64::from(pickups)
                }
                other => return Err(PlanningError::UnknownVehicleType(other.into())),
            };
        }
        let price = (base * (1.0 + self.profit_margin)).ceil();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(price.max(0.0) as u64)
    }
}

impl Default for DeliveryCostCalculator {
    fn default() -> Self {
        Self::new(500.0, 0.5)
    }
}
