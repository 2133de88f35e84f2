use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use bulk_event_bus::{EventPublisher, EventRecord};
use bulk_logging::{JsonLogger, LogLevel, LogRecord};
use chrono::NaiveDate;
use serde_json::Value;

/// Builder for orchestrator telemetry sinks.
pub struct AutonomyTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl AutonomyTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            event_publisher: None,
        }
    }

    /// Writes JSON-lines records to `path`.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Publishes events through `publisher`.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Opens the sinks.
    pub fn build(self) -> Result<AutonomyTelemetry> {
        let logger = self.log_path.map(JsonLogger::new).transpose()?;
        Ok(AutonomyTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
                publisher: self.event_publisher,
            }),
        })
    }
}

/// Structured log and event sink shared by the orchestrator's components.
///
/// Every record is also forwarded to `tracing`, so a handle without sinks
/// still shows up in the process log.
#[derive(Clone)]
pub struct AutonomyTelemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl fmt::Debug for AutonomyTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutonomyTelemetry")
            .field("module", &self.inner.module)
            .field("log", &self.inner.logger.as_ref().map(JsonLogger::path))
            .field("events", &self.inner.publisher.is_some())
            .finish()
    }
}

impl AutonomyTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> AutonomyTelemetryBuilder {
        AutonomyTelemetryBuilder::new(module)
    }

    /// Component name stamped on records.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Logs a structured record for the simulated date.
    pub fn log(
        &self,
        level: LogLevel,
        message: &str,
        sim_date: Option<NaiveDate>,
        metadata: Value,
    ) -> Result<()> {
        let record = LogRecord::new(&self.inner.module, level, message)
            .at_sim_date(sim_date)
            .with_metadata(metadata);
        record.emit();
        if let Some(logger) = &self.inner.logger {
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Publishes an event for the simulated date.
    pub async fn event(
        &self,
        event_type: &str,
        sim_date: Option<NaiveDate>,
        payload: Value,
    ) -> Result<()> {
        if let Some(publisher) = &self.inner.publisher {
            publisher
                .publish(EventRecord::new(&self.inner.module, event_type, sim_date, payload))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulk_event_bus::MemoryEventBus;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_log_and_event() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("autonomy.jsonl");
        let bus = Arc::new(MemoryEventBus::new(16));
        let telemetry = AutonomyTelemetry::builder("autonomy")
            .log_path(&path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2050, 1, 5);
        telemetry
            .log(LogLevel::Info, "day.completed", day, json!({ "plans": 3 }))
            .unwrap();
        telemetry
            .event("autonomy.day.completed", day, json!({ "plans": 3 }))
            .await
            .unwrap();
        let records = bulk_logging::read_records(&path).unwrap();
        assert_eq!(records[0].message, "day.completed");
        assert_eq!(records[0].sim_date, day);
        assert_eq!(bus.snapshot()[0].source, "autonomy");
    }

    #[tokio::test]
    async fn sinkless_handle_is_a_no_op() {
        let telemetry = AutonomyTelemetry::builder("autonomy").build().unwrap();
        telemetry.log(LogLevel::Warn, "quiet", None, json!({})).unwrap();
        telemetry.event("quiet", None, json!({})).await.unwrap();
        assert_eq!(telemetry.module(), "autonomy");
    }
}
