use std::{
    fmt,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{Days, NaiveDate, Utc};
use parking_lot::RwLock;

use crate::errors::AutonomyError;

/// Real milliseconds in one simulated day.
pub const SIMULATED_DAY_IN_REAL_MS: u64 = 60_000;

/// Source of real time in milliseconds since the Unix epoch.
pub trait WallClock: Send + Sync + fmt::Debug {
    /// Current real time.
    fn now_millis(&self) -> i64;
}

/// Wall clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Hand-driven wall clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualWallClock {
    now: AtomicI64,
}

impl ManualWallClock {
    /// Creates a clock reading `now` milliseconds.
    #[must_use]
    pub const fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Sets the reading.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the reading forward.
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl WallClock for ManualWallClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Maps real elapsed time onto simulated calendar days.
#[derive(Debug)]
pub struct SimulatedClock {
    wall: Arc<dyn WallClock>,
    day_length_ms: u64,
    start_date: NaiveDate,
    epoch_ms: RwLock<Option<i64>>,
}

impl SimulatedClock {
    /// Creates an uninitialized clock.
    #[must_use]
    pub fn new(wall: Arc<dyn WallClock>, day_length_ms: u64, start_date: NaiveDate) -> Self {
        Self {
            wall,
            day_length_ms: day_length_ms.max(1),
            start_date,
            epoch_ms: RwLock::new(None),
        }
    }

    /// Sets the real-time origin of the simulation.
    pub fn initialize(&self, epoch_ms: i64) {
        *self.epoch_ms.write() = Some(epoch_ms);
    }

    /// Forgets the origin.
    pub fn reset(&self) {
        *self.epoch_ms.write() = None;
    }

    /// Whether an origin is set.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.epoch_ms.read().is_some()
    }

    /// First simulated date.
    #[must_use]
    pub const fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Whole simulated days elapsed since the origin.
    pub fn elapsed_days(&self) -> Result<i64, AutonomyError> {
        let epoch = (*self.epoch_ms.read()).ok_or(AutonomyError::ClockNotInitialized)?;
        let elapsed = self.wall.now_millis() - epoch;
        let day = i64::try_from(self.day_length_ms).unwrap_or(i64::MAX);
        Ok(elapsed.div_euclid(day))
    }

    /// Today's simulated date.
    pub fn current_date(&self) -> Result<NaiveDate, AutonomyError> {
        let days = self.elapsed_days()?;
        let shifted = if days >= 0 {
            self.start_date.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            self.start_date.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        shifted.ok_or(AutonomyError::DateOutOfRange(days))
    }

    /// Today's simulated date, or the first simulated date before initialization.
    #[must_use]
    pub fn current_date_or_start(&self) -> NaiveDate {
        self.current_date().unwrap_or(self.start_date)
    }

    /// Real duration of one simulated day.
    #[must_use]
    pub const fn day_length(&self) -> Duration {
        Duration::from_millis(self.day_length_ms)
    }

    /// Real time goods spend in transit before delivery: two thirds of a day.
    #[must_use]
    pub const fn transit_delay(&self) -> Duration {
        Duration::from_millis(self.day_length_ms * 2 / 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(wall: &Arc<ManualWallClock>) -> SimulatedClock {
        SimulatedClock::new(
            wall.clone(),
            SIMULATED_DAY_IN_REAL_MS,
            NaiveDate::from_ymd_opt(2050, 1, 1).unwrap(),
        )
    }

    #[test]
    fn uninitialized_clock_has_no_date() {
        let wall = Arc::new(ManualWallClock::new(0));
        let clock = clock(&wall);
        assert!(matches!(clock.current_date(), Err(AutonomyError::ClockNotInitialized)));
        assert_eq!(clock.current_date_or_start(), clock.start_date());
    }

    #[test]
    fn days_advance_with_real_time() {
        let wall = Arc::new(ManualWallClock::new(1_000_000));
        let clock = clock(&wall);
        clock.initialize(1_000_000);
        assert_eq!(clock.current_date().unwrap(), NaiveDate::from_ymd_opt(2050, 1, 1).unwrap());
        wall.advance(59_999);
        assert_eq!(clock.current_date().unwrap(), NaiveDate::from_ymd_opt(2050, 1, 1).unwrap());
        wall.advance(1);
        assert_eq!(clock.current_date().unwrap(), NaiveDate::from_ymd_opt(2050, 1, 2).unwrap());
        wall.advance(SIMULATED_DAY_IN_REAL_MS as i64 * 31);
        assert_eq!(clock.current_date().unwrap(), NaiveDate::from_ymd_opt(2050, 2, 2).unwrap());
    }

    #[test]
    fn time_before_epoch_rounds_down() {
        let wall = Arc::new(ManualWallClock::new(0));
        let clock = clock(&wall);
        clock.initialize(1);
        assert_eq!(
            clock.current_date().unwrap(),
            NaiveDate::from_ymd_opt(2049, 12, 31).unwrap()
        );
    }

    #[test]
    fn reset_clears_origin() {
        let wall = Arc::new(ManualWallClock::new(0));
        let clock = clock(&wall);
        clock.initialize(0);
        assert!(clock.is_initialized());
        clock.reset();
        assert!(!clock.is_initialized());
    }

    #[test]
    fn transit_delay_is_two_thirds_of_a_day() {
        let wall = Arc::new(ManualWallClock::new(0));
        let clock = SimulatedClock::new(wall, 15_000, NaiveDate::from_ymd_opt(2050, 1, 1).unwrap());
        assert_eq!(clock.transit_delay(), Duration::from_millis(10_000));
        assert_eq!(clock.day_length(), Duration::from_millis(15_000));
    }
}
