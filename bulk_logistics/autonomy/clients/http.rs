use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use super::{
    BankAccount, BankClient, Loan, LoanApplication, NotificationTransport, PaymentReceipt,
    PaymentRequest, TransportResponse, TruckOffer, TruckPurchase, TruckPurchaseRequest,
    TruckVendor,
};
use crate::{dispatch::LogisticsNotification, errors::ServiceError};

const BODY_EXCERPT: usize = 256;

/// First [`BODY_EXCERPT`] characters of an error body.
fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT).collect()
}

#[derive(Debug, Clone)]
struct JsonApi {
    service: &'static str,
    base_url: String,
    client: Client,
}

impl JsonApi {
    fn new(service: &'static str, base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ServiceError::InvalidRequest {
                service: service.into(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn unreachable(&self, err: &reqwest::Error) -> ServiceError {
        ServiceError::Unreachable {
            service: self.service.into(),
            reason: err.to_string(),
        }
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                service: self.service.into(),
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ServiceError::InvalidResponse {
                service: self.service.into(),
                reason: err.to_string(),
            })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|err| self.unreachable(&err))?;
        self.decode(response).await
    }

    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ServiceError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|err| self.unreachable(&err))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.decode(response).await.map(Some)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|err| self.unreachable(&err))?;
        self.decode(response).await
    }
}

/// Commercial bank over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBankClient {
    api: JsonApi,
}

impl HttpBankClient {
    /// Creates a client for the bank at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            api: JsonApi::new("commercial-bank", base_url, timeout)?,
        })
    }
}

#[derive(Deserialize)]
struct LoanList {
    #[serde(default)]
    loans: Vec<Loan>,
}

#[derive(Deserialize)]
struct Balance {
    balance: f64,
}

#[async_trait]
impl BankClient for HttpBankClient {
    async fn account(&self) -> Result<Option<BankAccount>, ServiceError> {
        self.api.get_optional("account/me").await
    }

    async fn create_account(&self, notification_url: &str) -> Result<BankAccount, ServiceError> {
        self.api
            .post("account", &json!({ "notification_url": notification_url }))
            .await
    }

    async fn loans(&self) -> Result<Vec<Loan>, ServiceError> {
        let list: LoanList = self.api.get("loan").await?;
        Ok(list.loans)
    }

    async fn apply_for_loan(&self, amount: f64) -> Result<LoanApplication, ServiceError> {
        self.api.post("loan", &json!({ "amount": amount })).await
    }

    async fn balance(&self) -> Result<f64, ServiceError> {
        let balance: Balance = self.api.get("account/me/balance").await?;
        Ok(balance.balance)
    }

    async fn make_payment(&self, payment: &PaymentRequest) -> Result<PaymentReceipt, ServiceError> {
        self.api.post("transaction", payment).await
    }
}

/// Truck vendor over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTruckVendor {
    api: JsonApi,
}

impl HttpTruckVendor {
    /// Creates a client for the vendor at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        Ok(Self {
            api: JsonApi::new("truck-vendor", base_url, timeout)?,
        })
    }
}

#[async_trait]
impl TruckVendor for HttpTruckVendor {
    async fn truck_catalogue(&self) -> Result<Vec<TruckOffer>, ServiceError> {
        self.api.get("trucks").await
    }

    async fn purchase_truck(
        &self,
        order: &TruckPurchaseRequest,
    ) -> Result<TruckPurchase, ServiceError> {
        self.api.post("trucks", order).await
    }
}

/// Posts notifications to `<company url>/logistics`.
#[derive(Debug, Clone)]
pub struct HttpNotificationTransport {
    client: Client,
}

impl HttpNotificationTransport {
    /// Creates a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ServiceError::InvalidRequest {
                service: "notification".into(),
                reason: err.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NotificationTransport for HttpNotificationTransport {
    async fn send(
        &self,
        notification: &LogisticsNotification,
    ) -> Result<TransportResponse, ServiceError> {
        let endpoint = notification
            .endpoint()
            .ok_or_else(|| ServiceError::InvalidRequest {
                service: "notification".into(),
                reason: format!(
                    "no notification URL for order {}",
                    notification.id
                ),
            })?;
        let response = self
            .client
            .post(&endpoint)
            .json(&notification.wire_body())
            .send()
            .await
            .map_err(|err| ServiceError::Unreachable {
                service: endpoint.clone(),
                reason: err.to_string(),
            })?;
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(serde_json::Value::Null);
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_paths_without_double_slashes() {
        let api = JsonApi::new("bank", "https://bank.example/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.url("/account/me"), "https://bank.example/api/account/me");
        assert_eq!(api.url("loan"), "https://bank.example/api/loan");
    }

    #[test]
    fn error_bodies_are_cut_on_character_boundaries() {
        let body = format!("{}é{}", "a".repeat(255), "b".repeat(50));
        let cut = excerpt(&body);
        assert_eq!(cut.chars().count(), BODY_EXCERPT);
        assert!(cut.ends_with('é'));
        assert_eq!(excerpt("short"), "short");
    }

    #[tokio::test]
    async fn unreachable_hosts_surface_as_service_errors() {
        let bank = HttpBankClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let err = bank.balance().await.unwrap_err();
        assert!(matches!(err, ServiceError::Unreachable { .. }));
    }
}
