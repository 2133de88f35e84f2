use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::SIMULATED_DAY_IN_REAL_MS;

/// One truck order placed during bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FleetOrder {
    /// Vendor truck name (`large_truck`, `medium_truck`, ...).
    pub truck_name: String,
    /// Trucks to buy.
    pub quantity: u32,
}

impl FleetOrder {
    /// Creates an order.
    #[must_use]
    pub fn new(truck_name: impl Into<String>, quantity: u32) -> Self {
        Self {
            truck_name: truck_name.into(),
            quantity,
        }
    }
}

/// Remote service locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EndpointConfig {
    /// Commercial bank API.
    pub bank_base_url: String,
    /// Truck vendor API.
    pub vendor_base_url: String,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bank_base_url: "https://commercial-bank-api.projects.bbdgrad.com/api".into(),
            vendor_base_url: "https://thoh-api.projects.bbdgrad.com/api".into(),
            request_timeout_ms: 10_000,
        }
    }
}

impl EndpointConfig {
    /// Request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Optional telemetry sinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// JSON-lines operational log.
    pub log_path: Option<PathBuf>,
    /// JSON-lines event log.
    pub event_log_path: Option<PathBuf>,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutonomyConfig {
    /// Our company name at the bank and on the market.
    pub company_name: String,
    /// Real milliseconds per simulated day.
    pub day_length_ms: u64,
    /// Real milliseconds between ticks.
    pub tick_interval_ms: u64,
    /// First simulated date.
    pub simulation_start: NaiveDate,
    /// Simulated days a failed vehicle stays out of service.
    pub reactivation_delay_days: u32,
    /// URL the bank calls back with transaction notices.
    pub bank_notification_url: String,
    /// Loan size as a multiple of the initial fleet price.
    pub loan_cover_multiplier: f64,
    /// Trucks bought on the first day.
    pub initial_fleet: Vec<FleetOrder>,
    /// Remote services.
    pub endpoints: EndpointConfig,
    /// Telemetry sinks.
    pub telemetry: TelemetryConfig,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        Self {
            company_name: "bulk-logistics".into(),
            day_length_ms: SIMULATED_DAY_IN_REAL_MS,
            tick_interval_ms: 15_000,
            simulation_start: NaiveDate::from_ymd_opt(2050, 1, 1).unwrap_or_default(),
            reactivation_delay_days: 2,
            bank_notification_url: "https://bulk-logistics-api.projects.bbdgrad.com/api/bank"
                .into(),
            loan_cover_multiplier: 2.0,
            initial_fleet: vec![
                FleetOrder::new("large_truck", 4),
                FleetOrder::new("medium_truck", 4),
            ],
            endpoints: EndpointConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AutonomyConfig {
    /// Loads and validates settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading autonomy config {}", path.display()))?;
        let config = Self::from_toml(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Parses and validates settings from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.company_name.trim().is_empty() {
            bail!("company_name must not be empty");
        }
        if self.day_length_ms == 0 {
            bail!("day_length_ms must be positive");
        }
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be positive");
        }
        if self.loan_cover_multiplier.is_nan() || self.loan_cover_multiplier < 1.0 {
            bail!(
                "loan_cover_multiplier must be at least 1, got {}",
                self.loan_cover_multiplier
            );
        }
        if let Some(order) = self.initial_fleet.iter().find(|o| o.truck_name.is_empty()) {
            bail!("initial fleet order for {} trucks has no truck name", order.quantity);
        }
        Ok(())
    }

    /// Tick period.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AutonomyConfig::from_toml("").unwrap();
        assert_eq!(config, AutonomyConfig::default());
        assert_eq!(config.day_length_ms, 60_000);
        assert_eq!(config.initial_fleet.len(), 2);
    }

    #[test]
    fn loads_overrides_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("autonomy.toml");
        fs::write(
            &path,
            r#"
company_name = "bulk-logistics"
day_length_ms = 15000
tick_interval_ms = 1000
simulation_start = "2050-03-01"

[[initial_fleet]]
truck_name = "small_truck"
quantity = 2

[endpoints]
bank_base_url = "http://localhost:9000"
"#,
        )
        .unwrap();
        let config = AutonomyConfig::load(&path).unwrap();
        assert_eq!(config.day_length_ms, 15_000);
        assert_eq!(config.simulation_start, NaiveDate::from_ymd_opt(2050, 3, 1).unwrap());
        assert_eq!(config.initial_fleet, vec![FleetOrder::new("small_truck", 2)]);
        assert_eq!(config.endpoints.bank_base_url, "http://localhost:9000");
        assert_eq!(config.endpoints.request_timeout_ms, 10_000);
    }

    #[test]
    fn rejects_zero_day_length() {
        let err = AutonomyConfig::from_toml("day_length_ms = 0").unwrap_err();
        assert!(err.to_string().contains("day_length_ms"));
    }

    #[test]
    fn rejects_loans_smaller_than_the_fleet() {
        assert!(AutonomyConfig::from_toml("loan_cover_multiplier = 0.5").is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = AutonomyConfig::load("/nonexistent/autonomy.toml").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/autonomy.toml"));
    }
}
