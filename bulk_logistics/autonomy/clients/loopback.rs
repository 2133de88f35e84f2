use std::collections::VecDeque;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    BankAccount, BankClient, Loan, LoanApplication, NotificationTransport, PaymentReceipt,
    PaymentRequest, TransportResponse, TruckDelivery, TruckOffer, TruckPurchase,
    TruckPurchaseRequest, TruckVendor,
};
use crate::{dispatch::LogisticsNotification, errors::ServiceError};

/// Transport answering from a script; unscripted sends succeed with 200.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<u16, String>>>,
    failing_endpoints: Mutex<Vec<String>>,
    sent: Mutex<Vec<LogisticsNotification>>,
}

impl ScriptedTransport {
    /// Creates a transport that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers the next send with `status`.
    pub fn push_status(&self, status: u16) {
        self.script.lock().push_back(Ok(status));
    }

    /// Fails the next send at transport level.
    pub fn push_error(&self, reason: &str) {
        self.script.lock().push_back(Err(reason.to_string()));
    }

    /// Answers 500 to every send aimed at `endpoint`.
    pub fn fail_url(&self, endpoint: &str) {
        self.failing_endpoints.lock().push(endpoint.to_string());
    }

    /// Stops failing every endpoint.
    pub fn heal(&self) {
        self.failing_endpoints.lock().clear();
    }

    /// Notices sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<LogisticsNotification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationTransport for ScriptedTransport {
    async fn send(
        &self,
        notification: &LogisticsNotification,
    ) -> Result<TransportResponse, ServiceError> {
        self.sent.lock().push(notification.clone());
        let endpoint = notification
            .endpoint()
            .ok_or_else(|| ServiceError::InvalidRequest {
                service: "notification".into(),
                reason: format!("no notification URL for order {}", notification.id),
            })?;
        if self.failing_endpoints.lock().contains(&endpoint) {
            return Ok(TransportResponse {
                status: 500,
                body: serde_json::Value::Null,
            });
        }
        match self.script.lock().pop_front().unwrap_or(Ok(200)) {
            Ok(status) => Ok(TransportResponse {
                status,
                body: serde_json::json!({ "received": notification.id }),
            }),
            Err(reason) => Err(ServiceError::Unreachable {
                service: endpoint,
                reason,
            }),
        }
    }
}

#[derive(Debug, Default)]
struct BankBook {
    account: Option<BankAccount>,
    notification_url: Option<String>,
    loans: Vec<Loan>,
    balance: f64,
    payments: Vec<PaymentRequest>,
    offline: bool,
}

/// Bank kept in memory: loans credit the balance, payments debit it.
#[derive(Debug, Default)]
pub struct LoopbackBank {
    book: Mutex<BankBook>,
}

impl LoopbackBank {
    /// Creates a bank with no account.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bank where our account and a loan already exist.
    #[must_use]
    pub fn with_existing_account(account_number: &str, balance: f64) -> Self {
        let bank = Self::new();
        {
            let mut book = bank.book.lock();
            book.account = Some(BankAccount {
                account_number: account_number.into(),
            });
            book.loans.push(Loan {
                loan_number: "LN-existing".into(),
                initial_amount: balance,
                outstanding_amount: balance,
            });
            book.balance = balance;
        }
        bank
    }

    /// Makes every call fail as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.book.lock().offline = offline;
    }

    /// Payments made so far.
    #[must_use]
    pub fn payments(&self) -> Vec<PaymentRequest> {
        self.book.lock().payments.clone()
    }

    /// Loans held.
    #[must_use]
    pub fn held_loans(&self) -> Vec<Loan> {
        self.book.lock().loans.clone()
    }

    /// URL registered for transaction notices.
    #[must_use]
    pub fn notification_url(&self) -> Option<String> {
        self.book.lock().notification_url.clone()
    }

    fn open(&self) -> Result<parking_lot::MutexGuard<'_, BankBook>, ServiceError> {
        let book = self.book.lock();
        if book.offline {
            return Err(ServiceError::Unreachable {
                service: "commercial-bank".into(),
                reason: "loopback bank offline".into(),
            });
        }
        Ok(book)
    }
}

#[async_trait]
impl BankClient for LoopbackBank {
    async fn account(&self) -> Result<Option<BankAccount>, ServiceError> {
        Ok(self.open()?.account.clone())
    }

    async fn create_account(&self, notification_url: &str) -> Result<BankAccount, ServiceError> {
        let mut book = self.open()?;
        let account = BankAccount {
            account_number: Uuid::new_v4().simple().to_string()[..12].to_string(),
        };
        book.account = Some(account.clone());
        book.notification_url = Some(notification_url.to_string());
        Ok(account)
    }

    async fn loans(&self) -> Result<Vec<Loan>, ServiceError> {
        Ok(self.open()?.loans.clone())
    }

    async fn apply_for_loan(&self, amount: f64) -> Result<LoanApplication, ServiceError> {
        let mut book = self.open()?;
        let loan_number = format!("LN-{}", book.loans.len() + 1);
        book.loans.push(Loan {
            loan_number: loan_number.clone(),
            initial_amount: amount,
            outstanding_amount: amount,
        });
        book.balance += amount;
        Ok(LoanApplication {
            success: true,
            loan_number: Some(loan_number),
        })
    }

    async fn balance(&self) -> Result<f64, ServiceError> {
        Ok(self.open()?.balance)
    }

    async fn make_payment(&self, payment: &PaymentRequest) -> Result<PaymentReceipt, ServiceError> {
        let mut book = self.open()?;
        if payment.amount > book.balance {
            return Err(ServiceError::Status {
                service: "commercial-bank".into(),
                status: 400,
                body: "insufficient funds".into(),
            });
        }
        book.balance -= payment.amount;
        book.payments.push(payment.clone());
        Ok(PaymentReceipt {
            success: true,
            transaction_number: Some(format!("TX-{}", book.payments.len())),
        })
    }
}

/// Truck vendor kept in memory; orders become pending deliveries.
#[derive(Debug)]
pub struct LoopbackVendor {
    catalogue: IndexMap<String, TruckOffer>,
    bank_account: String,
    orders: Mutex<Vec<TruckPurchase>>,
    pending: Mutex<Vec<TruckDelivery>>,
}

impl LoopbackVendor {
    /// Creates a vendor selling the given models.
    #[must_use]
    pub fn new(offers: Vec<TruckOffer>) -> Self {
        Self {
            catalogue: offers
                .into_iter()
                .map(|offer| (offer.truck_name.clone(), offer))
                .collect(),
            bank_account: "vendor-0001".into(),
            orders: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Vendor selling large, medium and small trucks.
    #[must_use]
    pub fn standard() -> Self {
        let offer = |name: &str, price: f64, operating_cost: f64, maximum_load: u64| TruckOffer {
            truck_name: name.into(),
            price,
            operating_cost,
            maximum_load,
        };
        Self::new(vec![
            offer("large_truck", 100_000.0, 500.0, 5000),
            offer("medium_truck", 60_000.0, 300.0, 2000),
            offer("small_truck", 30_000.0, 150.0, 500),
        ])
    }

    /// Orders placed so far.
    #[must_use]
    pub fn orders(&self) -> Vec<TruckPurchase> {
        self.orders.lock().clone()
    }

    /// Deliveries not yet handed over; draining them simulates the vendor callback.
    pub fn take_deliveries(&self) -> Vec<TruckDelivery> {
        std::mem::take(&mut *self.pending.lock())
    }
}

#[async_trait]
impl TruckVendor for LoopbackVendor {
    async fn truck_catalogue(&self) -> Result<Vec<TruckOffer>, ServiceError> {
        Ok(self.catalogue.values().cloned().collect())
    }

    async fn purchase_truck(
        &self,
        order: &TruckPurchaseRequest,
    ) -> Result<TruckPurchase, ServiceError> {
        let offer = self
            .catalogue
            .get(&order.truck_name)
            .ok_or_else(|| ServiceError::InvalidRequest {
                service: "truck-vendor".into(),
                reason: format!("unknown truck {}", order.truck_name),
            })?;
        let operating_cost_per_day = format!("{}/day", offer.operating_cost);
        let mut orders = self.orders.lock();
        let purchase = TruckPurchase {
            order_id: i64::try_from(orders.len()).unwrap_or(i64::MAX) + 1,
            truck_name: offer.truck_name.clone(),
            price: offer.price,
            quantity: order.quantity,
            bank_account: self.bank_account.clone(),
            maximum_load: offer.maximum_load,
            operating_cost_per_day: operating_cost_per_day.clone(),
        };
        orders.push(purchase.clone());
        self.pending.lock().push(TruckDelivery {
            can_fulfill: true,
            message: None,
            item_name: offer.truck_name.clone(),
            quantity: order.quantity,
            operating_cost_per_day,
            maximum_load: offer.maximum_load,
        });
        Ok(purchase)
    }
}
