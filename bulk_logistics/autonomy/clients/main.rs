use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{dispatch::LogisticsNotification, errors::ServiceError};

/// reqwest-backed clients.
pub mod http;
/// In-process clients for offline runs and tests.
pub mod loopback;

pub use http::{HttpBankClient, HttpNotificationTransport, HttpTruckVendor};
pub use loopback::{LoopbackBank, LoopbackVendor, ScriptedTransport};

/// Counterparty answer to a notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status.
    pub status: u16,
    /// Response body, `null` when absent or not JSON.
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Delivers notifications to counterparties.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Sends the notice, returning whatever status the counterparty answered.
    async fn send(
        &self,
        notification: &LogisticsNotification,
    ) -> Result<TransportResponse, ServiceError>;
}

/// Our account at the commercial bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankAccount {
    /// Account number.
    pub account_number: String,
}

/// A loan held with the bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Loan {
    /// Loan number.
    pub loan_number: String,
    /// Amount borrowed.
    pub initial_amount: f64,
    /// Amount still owed.
    pub outstanding_amount: f64,
}

/// Bank answer to a loan application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoanApplication {
    /// Whether the loan was granted.
    pub success: bool,
    /// Loan number when granted.
    #[serde(default)]
    pub loan_number: Option<String>,
}

/// Reason attached to a payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentCategory {
    /// Fleet purchase.
    Purchase,
}

/// Outgoing transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRequest {
    /// Beneficiary account.
    pub to_account_number: String,
    /// Amount.
    pub amount: f64,
    /// Free text shown to the beneficiary.
    pub description: String,
    /// Category.
    pub category: PaymentCategory,
}

/// Bank answer to a payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// Whether the transfer went through.
    pub success: bool,
    /// Bank transaction number.
    #[serde(default)]
    pub transaction_number: Option<String>,
}

/// Commercial bank operations used by bootstrap.
#[async_trait]
pub trait BankClient: Send + Sync {
    /// Our account, if one exists.
    async fn account(&self) -> Result<Option<BankAccount>, ServiceError>;
    /// Opens an account that reports transactions to `notification_url`.
    async fn create_account(&self, notification_url: &str) -> Result<BankAccount, ServiceError>;
    /// Loans currently held.
    async fn loans(&self) -> Result<Vec<Loan>, ServiceError>;
    /// Applies for a loan.
    async fn apply_for_loan(&self, amount: f64) -> Result<LoanApplication, ServiceError>;
    /// Current balance.
    async fn balance(&self) -> Result<f64, ServiceError>;
    /// Transfers money.
    async fn make_payment(&self, payment: &PaymentRequest) -> Result<PaymentReceipt, ServiceError>;
}

/// A truck model on sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TruckOffer {
    /// Model name.
    pub truck_name: String,
    /// Unit price.
    pub price: f64,
    /// Daily running cost.
    pub operating_cost: f64,
    /// Maximum load.
    pub maximum_load: u64,
}

/// Truck order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TruckPurchaseRequest {
    /// Model name.
    pub truck_name: String,
    /// Trucks wanted.
    pub quantity: u32,
}

/// Vendor answer to an order; payment is due to `bank_account`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TruckPurchase {
    /// Vendor order id.
    pub order_id: i64,
    /// Model name.
    pub truck_name: String,
    /// Unit price.
    pub price: f64,
    /// Trucks ordered.
    pub quantity: u32,
    /// Vendor account to pay.
    pub bank_account: String,
    /// Maximum load.
    pub maximum_load: u64,
    /// Running cost as quoted (`"500/day"`).
    pub operating_cost_per_day: String,
}

/// Truck vendor operations used by bootstrap.
#[async_trait]
pub trait TruckVendor: Send + Sync {
    /// Models on sale.
    async fn truck_catalogue(&self) -> Result<Vec<TruckOffer>, ServiceError>;
    /// Places an order.
    async fn purchase_truck(
        &self,
        order: &TruckPurchaseRequest,
    ) -> Result<TruckPurchase, ServiceError>;
}

/// Vendor callback announcing that ordered trucks arrived, or cannot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TruckDelivery {
    /// Whether the order could be fulfilled.
    pub can_fulfill: bool,
    /// Vendor remark.
    #[serde(default)]
    pub message: Option<String>,
    /// Model name delivered.
    pub item_name: String,
    /// Trucks delivered.
    pub quantity: u32,
    /// Running cost as quoted (`"500/day"` or `"500"`).
    #[serde(default)]
    pub operating_cost_per_day: String,
    /// Maximum load.
    pub maximum_load: u64,
}

/// Vendor callback announcing broken-down trucks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TruckFailure {
    /// Model name.
    pub truck_name: String,
    /// Trucks out of service.
    pub failure_quantity: i64,
}

/// Parses the leading number of a running-cost string such as `"500/day"`.
#[must_use]
pub fn parse_operating_cost(raw: &str) -> Option<f64> {
    let numeric: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse().ok()
}
