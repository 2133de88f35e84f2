use std::{fs, path::Path, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use bulk_autonomy::{
    AutonomyConfig, AutonomyOrchestrator, AutonomyTelemetry, HttpBankClient,
    HttpNotificationTransport, HttpTruckVendor, InMemoryStore, LoopbackBank, LoopbackVendor,
    ScriptedTransport,
};
use bulk_event_bus::FileEventPublisher;
use bulk_planning::{
    DeliveryCostCalculator, PickupRequest, QuoteRequest, ShipmentPlanner, Vehicle, VehicleSelector,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "bulk_logistics", version, about = "Bulk logistics fleet orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the orchestrator until interrupted.
    Run {
        #[arg(long)]
        config: PathBuf,
        /// Real-time origin of the simulation in Unix milliseconds (defaults to now).
        #[arg(long)]
        epoch_ms: Option<i64>,
        /// Uses in-process bank, vendor and notification endpoints.
        #[arg(long)]
        offline: bool,
    },
    /// Plans a day from a `{requests, vehicles}` JSON fixture.
    Plan {
        #[arg(long)]
        fixture: PathBuf,
    },
    /// Quotes vehicles and price from a `{request, vehicles}` JSON fixture.
    Quote {
        #[arg(long)]
        fixture: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
struct PlanFixture {
    requests: Vec<PickupRequest>,
    vehicles: Vec<Vehicle>,
}

#[derive(Debug, Deserialize)]
struct QuoteFixture {
    request: QuoteRequest,
    vehicles: Vec<Vehicle>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            epoch_ms,
            offline,
        } => {
            let config = AutonomyConfig::load(&config)?;
            let runtime = Runtime::new().context("starting tokio runtime")?;
            runtime.block_on(run(config, epoch_ms, offline))
        }
        Commands::Plan { fixture } => {
            let fixture: PlanFixture = read_fixture(&fixture)?;
            let plan = ShipmentPlanner::new().plan(&fixture.requests, &fixture.vehicles);
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Commands::Quote { fixture } => {
            let fixture: QuoteFixture = read_fixture(&fixture)?;
            let selection = VehicleSelector::new().select(&fixture.request, &fixture.vehicles);
            let cost = DeliveryCostCalculator::default().quote(&fixture.request, &fixture.vehicles)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "selection": selection, "cost": cost }))?
            );
            Ok(())
        }
    }
}

fn read_fixture<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing fixture {}", path.display()))
}

fn build_telemetry(config: &AutonomyConfig) -> Result<Option<AutonomyTelemetry>> {
    let sinks = &config.telemetry;
    if sinks.log_path.is_none() && sinks.event_log_path.is_none() {
        return Ok(None);
    }
    let mut builder = AutonomyTelemetry::builder("autonomy");
    if let Some(path) = &sinks.log_path {
        builder = builder.log_path(path);
    }
    if let Some(path) = &sinks.event_log_path {
        builder = builder.event_publisher(Arc::new(FileEventPublisher::new(path)?));
    }
    Ok(Some(builder.build()?))
}

async fn run(config: AutonomyConfig, epoch_ms: Option<i64>, offline: bool) -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let tick_interval = config.tick_interval();
    let telemetry = build_telemetry(&config)?;
    let mut builder = AutonomyOrchestrator::builder(config.clone()).store(store);
    if let Some(tel) = telemetry {
        builder = builder.telemetry(tel);
    }

    let mut vendor_feed = None;
    if offline {
        let vendor = Arc::new(LoopbackVendor::standard());
        vendor_feed = Some(vendor.clone());
        builder = builder
            .bank(Arc::new(LoopbackBank::new()))
            .vendor(vendor)
            .transport(Arc::new(ScriptedTransport::new()));
    } else {
        let endpoints = &config.endpoints;
        let timeout = endpoints.request_timeout();
        builder = builder
            .bank(Arc::new(HttpBankClient::new(&endpoints.bank_base_url, timeout)?))
            .vendor(Arc::new(HttpTruckVendor::new(&endpoints.vendor_base_url, timeout)?))
            .transport(Arc::new(HttpNotificationTransport::new(timeout)?));
    }
    let orchestrator = builder.build()?;
    orchestrator.start(epoch_ms.unwrap_or_else(|| Utc::now().timestamp_millis()))?;

    // Offline, the vendor's delivery callbacks are drained on the tick period.
    let deliveries = vendor_feed.map(|vendor| {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            loop {
                ticker.tick().await;
                for delivery in vendor.take_deliveries() {
                    if let Err(err) = orchestrator.handle_truck_delivery(&delivery).await {
                        warn!(%err, "truck delivery not recorded");
                    }
                }
            }
        })
    });

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    if let Some(task) = deliveries {
        task.abort();
    }
    orchestrator.stop();
    info!(state = ?orchestrator.state(), "shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn plan_fixture_parses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");
        fs::write(&path, r#"{ "requests": [], "vehicles": [] }"#).unwrap();
        let fixture: PlanFixture = read_fixture(&path).unwrap();
        assert!(ShipmentPlanner::new()
            .plan(&fixture.requests, &fixture.vehicles)
            .is_empty());
    }

    #[test]
    fn missing_fixture_names_the_path() {
        let err = read_fixture::<PlanFixture>(Path::new("/nonexistent/plan.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/plan.json"));
    }

    #[test]
    fn telemetry_is_optional() {
        assert!(build_telemetry(&AutonomyConfig::default()).unwrap().is_none());
        let dir = tempdir().unwrap();
        let mut config = AutonomyConfig::default();
        config.telemetry.event_log_path = Some(dir.path().join("events.jsonl"));
        assert!(build_telemetry(&config).unwrap().is_some());
    }
}
