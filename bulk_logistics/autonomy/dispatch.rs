use std::sync::Arc;

use bulk_logging::LogLevel;
use bulk_planning::{PickupRequestId, PlannedItem};
use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    clients::NotificationTransport, errors::AutonomyError, store::NotificationQueueStore,
    telemetry::AutonomyTelemetry,
};

/// What the counterparty is told.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationKind {
    /// Goods are about to be collected from the origin.
    Pickup,
    /// Goods have arrived at the destination.
    Delivery,
}

/// One line of a notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationItem {
    /// Item name.
    pub name: String,
    /// Quantity.
    pub quantity: u64,
}

/// Pickup or delivery notice for one planned item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogisticsNotification {
    /// Request the notice belongs to; keys the retry ledger.
    pub pickup_request_id: PickupRequestId,
    /// Order id on the counterparty's side.
    pub id: String,
    /// Counterparty base URL.
    #[serde(rename = "notificationURL")]
    pub notification_url: String,
    /// Pickup or delivery.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Total quantity.
    pub quantity: u64,
    /// Lines.
    pub items: Vec<NotificationItem>,
}

impl LogisticsNotification {
    fn for_item(item: &PlannedItem, kind: NotificationKind, url: &str) -> Self {
        Self {
            pickup_request_id: item.request_id,
            id: item.original_external_order_id.clone(),
            notification_url: url.to_string(),
            kind,
            quantity: item.quantity,
            items: vec![NotificationItem {
                name: item.name.clone(),
                quantity: item.quantity,
            }],
        }
    }

    /// Pickup notice addressed to the item's origin company.
    #[must_use]
    pub fn pickup(item: &PlannedItem) -> Self {
        Self::for_item(item, NotificationKind::Pickup, &item.origin.notification_url)
    }

    /// Delivery notice addressed to the item's destination company.
    #[must_use]
    pub fn delivery(item: &PlannedItem) -> Self {
        Self::for_item(item, NotificationKind::Delivery, &item.destination.notification_url)
    }

    /// Endpoint the notice is posted to, if the company has a URL.
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        let base = self.notification_url.trim().trim_end_matches('/');
        (!base.is_empty()).then(|| format!("{base}/logistics"))
    }

    /// Body sent to the counterparty.
    #[must_use]
    pub fn wire_body(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "type": self.kind,
            "quantity": self.quantity,
            "items": self.items,
        })
    }
}

/// Whether a notice is sent for the first time or re-sent from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOrigin {
    /// First attempt.
    Fresh,
    /// Re-send of a queued row.
    Retry,
}

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Counterparty acknowledged with a 2xx status.
    Delivered {
        /// HTTP status.
        status: u16,
    },
    /// Send failed; the ledger holds the notice.
    Queued {
        /// Retry counter of the ledger row.
        retry_count: u32,
        /// Failure description.
        reason: String,
    },
}

impl DispatchOutcome {
    /// Whether the counterparty acknowledged.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Sends notifications and keeps the retry ledger in step.
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    queue: Arc<dyn NotificationQueueStore>,
    telemetry: Option<AutonomyTelemetry>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        queue: Arc<dyn NotificationQueueStore>,
    ) -> Self {
        Self {
            transport,
            queue,
            telemetry: None,
        }
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: AutonomyTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    async fn attempt(&self, notification: &LogisticsNotification) -> Result<u16, String> {
        match self.transport.send(notification).await {
            Ok(response) if (200..300).contains(&response.status) => Ok(response.status),
            Ok(response) => Err(format!("status {}", response.status)),
            Err(err) => Err(err.to_string()),
        }
    }

    async fn record_failure(
        &self,
        queued: &LogisticsNotification,
        reason: String,
        now: NaiveDate,
    ) -> Result<DispatchOutcome, AutonomyError> {
        let row = self.queue.upsert_failed(queued, now).await?;
        warn!(
            request_id = queued.pickup_request_id,
            retry_count = row.retry_count,
            %reason,
            "notification queued for retry"
        );
        if let Some(tel) = &self.telemetry {
            let payload = json!({
                "pickup_request_id": queued.pickup_request_id,
                "type": queued.kind,
                "retry_count": row.retry_count,
                "reason": reason,
            });
            let _ = tel.log(LogLevel::Warn, "notification.queued", Some(now), payload.clone());
            let _ = tel.event("autonomy.notification.queued", Some(now), payload).await;
        }
        Ok(DispatchOutcome::Queued {
            retry_count: row.retry_count,
            reason,
        })
    }

    /// Sends a notice. Failures are recorded in the ledger; a delivered retry leaves it.
    pub async fn dispatch(
        &self,
        notification: &LogisticsNotification,
        origin: DispatchOrigin,
        now: NaiveDate,
    ) -> Result<DispatchOutcome, AutonomyError> {
        match self.attempt(notification).await {
            Ok(status) => {
                if origin == DispatchOrigin::Retry {
                    self.queue
                        .delete_by_request_id(notification.pickup_request_id)
                        .await?;
                }
                debug!(request_id = notification.pickup_request_id, status, "notification delivered");
                Ok(DispatchOutcome::Delivered { status })
            }
            Err(reason) => self.record_failure(notification, reason, now).await,
        }
    }

    /// Sends a pickup notice. On failure the matching delivery notice is queued instead.
    pub async fn dispatch_pickup(
        &self,
        pickup: &LogisticsNotification,
        delivery: &LogisticsNotification,
        now: NaiveDate,
    ) -> Result<DispatchOutcome, AutonomyError> {
        match self.attempt(pickup).await {
            Ok(status) => Ok(DispatchOutcome::Delivered { status }),
            Err(reason) => self.record_failure(delivery, reason, now).await,
        }
    }

    /// Notices currently waiting in the ledger. Unreadable rows are skipped.
    pub async fn queued(&self) -> Result<Vec<LogisticsNotification>, AutonomyError> {
        let rows = self.queue.list_queued().await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                serde_json::from_value(row.payload)
                    .map_err(|err| warn!(row = row.id, %err, "unreadable queued notification"))
                    .ok()
            })
            .collect())
    }

    /// Sends a batch concurrently, returning outcomes in batch order.
    pub async fn dispatch_all(
        &self,
        batch: &[(LogisticsNotification, DispatchOrigin)],
        now: NaiveDate,
    ) -> Vec<Result<DispatchOutcome, AutonomyError>> {
        join_all(
            batch
                .iter()
                .map(|(notification, origin)| self.dispatch(notification, *origin, now)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::loopback::ScriptedTransport;
    use crate::store::InMemoryStore;
    use bulk_planning::{CapacityType, CompanyRef};

    fn item() -> PlannedItem {
        PlannedItem {
            request_id: 1,
            item_id: 10,
            name: "electronics".into(),
            quantity: 250,
            capacity_type: CapacityType::Unit,
            origin: CompanyRef::new("case-supplier", "https://case.example/api/"),
            destination: CompanyRef::new("pear", "https://pear.example/api"),
            original_external_order_id: "ext-77".into(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2050, 1, 2).unwrap()
    }

    fn dispatcher(transport: &Arc<ScriptedTransport>, store: &Arc<InMemoryStore>) -> NotificationDispatcher {
        NotificationDispatcher::new(transport.clone(), store.clone())
    }

    #[test]
    fn notices_address_the_right_company() {
        let pickup = LogisticsNotification::pickup(&item());
        let delivery = LogisticsNotification::delivery(&item());
        assert_eq!(pickup.endpoint().unwrap(), "https://case.example/api/logistics");
        assert_eq!(delivery.endpoint().unwrap(), "https://pear.example/api/logistics");
        assert_eq!(
            pickup.wire_body(),
            json!({
                "id": "ext-77",
                "type": "PICKUP",
                "quantity": 250,
                "items": [{ "name": "electronics", "quantity": 250 }],
            })
        );
    }

    #[test]
    fn blank_url_has_no_endpoint() {
        let mut notice = LogisticsNotification::delivery(&item());
        notice.notification_url = "  ".into();
        assert!(notice.endpoint().is_none());
    }

    #[tokio::test]
    async fn retry_round_trip_keeps_one_row() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = dispatcher(&transport, &store);
        let notice = LogisticsNotification::delivery(&item());

        transport.push_status(500);
        let first = dispatcher.dispatch(&notice, DispatchOrigin::Fresh, today()).await.unwrap();
        assert_eq!(first, DispatchOutcome::Queued { retry_count: 0, reason: "status 500".into() });
        assert_eq!(store.queued().len(), 1);

        transport.push_error("connection refused");
        let second = dispatcher.dispatch(&notice, DispatchOrigin::Retry, today()).await.unwrap();
        assert!(matches!(second, DispatchOutcome::Queued { retry_count: 1, .. }));
        assert_eq!(store.queued().len(), 1);
        assert_eq!(store.queued()[0].retry_count, 1);

        let retried = dispatcher.queued().await.unwrap();
        assert_eq!(retried, vec![notice.clone()]);

        let third = dispatcher.dispatch(&notice, DispatchOrigin::Retry, today()).await.unwrap();
        assert!(third.is_delivered());
        assert!(store.queued().is_empty());
    }

    #[tokio::test]
    async fn fresh_success_leaves_ledger_alone() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = dispatcher(&transport, &store);
        let notice = LogisticsNotification::delivery(&item());

        transport.push_status(404);
        dispatcher.dispatch(&notice, DispatchOrigin::Fresh, today()).await.unwrap();
        transport.push_status(201);
        let outcome = dispatcher.dispatch(&notice, DispatchOrigin::Fresh, today()).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Delivered { status: 201 });
        assert_eq!(store.queued().len(), 1);
    }

    #[tokio::test]
    async fn failed_pickup_queues_the_delivery() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = dispatcher(&transport, &store);
        let pickup = LogisticsNotification::pickup(&item());
        let delivery = LogisticsNotification::delivery(&item());

        transport.push_status(503);
        let outcome = dispatcher.dispatch_pickup(&pickup, &delivery, today()).await.unwrap();
        assert!(!outcome.is_delivered());
        let queued = dispatcher.queued().await.unwrap();
        assert_eq!(queued[0].kind, NotificationKind::Delivery);
        assert_eq!(transport.sent()[0].kind, NotificationKind::Pickup);
    }

    #[tokio::test]
    async fn batch_outcomes_follow_batch_order() {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(InMemoryStore::new());
        let dispatcher = dispatcher(&transport, &store);
        let mut other = item();
        other.request_id = 2;
        transport.fail_url("https://pear.example/api/logistics");
        let batch = vec![
            (LogisticsNotification::pickup(&item()), DispatchOrigin::Fresh),
            (LogisticsNotification::delivery(&other), DispatchOrigin::Fresh),
        ];
        let outcomes = dispatcher.dispatch_all(&batch, today()).await;
        assert!(outcomes[0].as_ref().unwrap().is_delivered());
        assert!(!outcomes[1].as_ref().unwrap().is_delivered());
        assert_eq!(store.queued()[0].pickup_request_id, 2);
    }
}
