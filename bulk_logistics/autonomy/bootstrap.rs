use std::sync::Arc;

use bulk_logging::LogLevel;
use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    clients::{
        BankClient, PaymentCategory, PaymentRequest, TruckOffer, TruckPurchase,
        TruckPurchaseRequest, TruckVendor,
    },
    config::FleetOrder,
    errors::AutonomyError,
    store::{CompanyStore, FleetStore},
    telemetry::AutonomyTelemetry,
};

/// What the one-time economic setup did.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BootstrapReport {
    /// Our bank account number.
    pub account_number: String,
    /// Whether the account was opened during this run.
    pub account_created: bool,
    /// Balance after setup.
    pub funds: f64,
    /// Loan taken during this run, if any.
    pub loan_number: Option<String>,
    /// Amount borrowed during this run.
    pub loan_amount: f64,
    /// Truck orders placed and paid.
    pub purchases: Vec<TruckPurchase>,
}

/// Opens the bank account, takes the start-up loan and buys the first fleet.
#[derive(Clone)]
pub struct EconomicBootstrap {
    company_name: String,
    bank_notification_url: String,
    loan_cover_multiplier: f64,
    initial_fleet: Vec<FleetOrder>,
    bank: Arc<dyn BankClient>,
    vendor: Arc<dyn TruckVendor>,
    fleet: Arc<dyn FleetStore>,
    companies: Arc<dyn CompanyStore>,
    telemetry: Option<AutonomyTelemetry>,
}

impl std::fmt::Debug for EconomicBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EconomicBootstrap")
            .field("company_name", &self.company_name)
            .field("initial_fleet", &self.initial_fleet)
            .finish_non_exhaustive()
    }
}

impl EconomicBootstrap {
    /// Creates the bootstrap for `company_name`.
    #[must_use]
    pub fn new(
        company_name: impl Into<String>,
        bank: Arc<dyn BankClient>,
        vendor: Arc<dyn TruckVendor>,
        fleet: Arc<dyn FleetStore>,
        companies: Arc<dyn CompanyStore>,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            bank_notification_url: String::new(),
            loan_cover_multiplier: 2.0,
            initial_fleet: Vec::new(),
            bank,
            vendor,
            fleet,
            companies,
            telemetry: None,
        }
    }

    /// URL the bank reports our transactions to.
    #[must_use]
    pub fn bank_notification_url(mut self, url: impl Into<String>) -> Self {
        self.bank_notification_url = url.into();
        self
    }

    /// Loan size as a multiple of the fleet price.
    #[must_use]
    pub const fn loan_cover_multiplier(mut self, multiplier: f64) -> Self {
        self.loan_cover_multiplier = multiplier;
        self
    }

    /// Trucks bought when the fleet is empty.
    #[must_use]
    pub fn initial_fleet(mut self, orders: Vec<FleetOrder>) -> Self {
        self.initial_fleet = orders;
        self
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: AutonomyTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Runs every setup step still needed. Steps already done are skipped.
    pub async fn run(&self, today: NaiveDate) -> Result<BootstrapReport, AutonomyError> {
        let mut report = BootstrapReport::default();

        if let Some(account) = self.bank.account().await? {
            report.account_number = account.account_number;
        } else {
            let account = self.bank.create_account(&self.bank_notification_url).await?;
            self.companies
                .update_bank_account(&self.company_name, &account.account_number)
                .await?;
            info!(account = %account.account_number, "bank account opened");
            report.account_number = account.account_number;
            report.account_created = true;
        }
        report.funds = self.bank.balance().await?;

        if self.bank.loans().await?.is_empty() {
            let catalogue = self.vendor.truck_catalogue().await?;
            let amount = self.fleet_cost(&catalogue)? * self.loan_cover_multiplier;
            let application = self.bank.apply_for_loan(amount).await?;
            if !application.success {
                return Err(AutonomyError::Bootstrap(format!("loan of {amount} was declined")));
            }
            info!(amount, loan = ?application.loan_number, "start-up loan granted");
            report.loan_number = application.loan_number;
            report.loan_amount = amount;
        }

        if self.fleet.all_vehicles().await?.is_empty() {
            report.purchases = self.buy_initial_fleet().await?;
        }
        match self.bank.balance().await {
            Ok(balance) => report.funds = balance,
            Err(err) => warn!(%err, "balance unavailable after bootstrap"),
        }

        if let Some(tel) = &self.telemetry {
            let payload = json!({
                "account_created": report.account_created,
                "loan_amount": report.loan_amount,
                "trucks_ordered": report.purchases.iter().map(|p| p.quantity).sum::<u32>(),
                "funds": report.funds,
            });
            let _ = tel.log(LogLevel::Info, "bootstrap.completed", Some(today), payload.clone());
            let _ = tel.event("autonomy.bootstrap.completed", Some(today), payload).await;
        }
        Ok(report)
    }

    fn fleet_cost(&self, catalogue: &[TruckOffer]) -> Result<f64, AutonomyError> {
        self.initial_fleet.iter().try_fold(0.0, |total, order| {
            let offer = catalogue
                .iter()
                .find(|offer| offer.truck_name == order.truck_name)
                .ok_or_else(|| {
                    AutonomyError::Bootstrap(format!("vendor does not sell {}", order.truck_name))
                })?;
            Ok(total + offer.price * f64::from(order.quantity))
        })
    }

    async fn buy_initial_fleet(&self) -> Result<Vec<TruckPurchase>, AutonomyError> {
        let orders = self
            .initial_fleet
            .iter()
            .filter(|order| order.quantity > 0)
            .map(|order| self.buy_and_pay(order));
        join_all(orders).await.into_iter().collect()
    }

    async fn buy_and_pay(&self, order: &FleetOrder) -> Result<TruckPurchase, AutonomyError> {
        let purchase = self
            .vendor
            .purchase_truck(&TruckPurchaseRequest {
                truck_name: order.truck_name.clone(),
                quantity: order.quantity,
            })
            .await?;
        let payment = PaymentRequest {
            to_account_number: purchase.bank_account.clone(),
            amount: purchase.price * f64::from(purchase.quantity),
            description: format!(
                "{} x {} (order {})",
                purchase.quantity, purchase.truck_name, purchase.order_id
            ),
            category: PaymentCategory::Purchase,
        };
        let receipt = self.bank.make_payment(&payment).await?;
        if !receipt.success {
            return Err(AutonomyError::Bootstrap(format!(
                "payment for truck order {} was refused",
                purchase.order_id
            )));
        }
        info!(
            truck = %purchase.truck_name,
            quantity = purchase.quantity,
            amount = payment.amount,
            "trucks ordered and paid"
        );
        Ok(purchase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{LoopbackBank, LoopbackVendor};
    use crate::store::{InMemoryStore, NewVehicle};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2050, 1, 1).unwrap()
    }

    fn bootstrap(
        bank: &Arc<LoopbackBank>,
        vendor: &Arc<LoopbackVendor>,
        store: &Arc<InMemoryStore>,
    ) -> EconomicBootstrap {
        EconomicBootstrap::new("bulk-logistics", bank.clone(), vendor.clone(), store.clone(), store.clone())
            .bank_notification_url("https://bulk.example/api/bank")
            .initial_fleet(vec![
                FleetOrder::new("large_truck", 2),
                FleetOrder::new("medium_truck", 1),
            ])
    }

    #[tokio::test]
    async fn first_run_opens_account_borrows_and_buys() {
        let bank = Arc::new(LoopbackBank::new());
        let vendor = Arc::new(LoopbackVendor::standard());
        let store = Arc::new(InMemoryStore::new());
        let report = bootstrap(&bank, &vendor, &store).run(today()).await.unwrap();

        assert!(report.account_created);
        assert_eq!(
            store.bank_account("bulk-logistics").as_deref(),
            Some(report.account_number.as_str())
        );
        assert_eq!(bank.notification_url().as_deref(), Some("https://bulk.example/api/bank"));
        // 2 x 100k + 1 x 60k, doubled
        assert!((report.loan_amount - 520_000.0).abs() < f64::EPSILON);
        assert_eq!(vendor.orders().len(), 2);
        let paid: f64 = bank.payments().iter().map(|p| p.amount).sum();
        assert!((paid - 260_000.0).abs() < f64::EPSILON);
        assert!(bank.payments().iter().all(|p| p.to_account_number == "vendor-0001"));
        assert!((report.funds - 260_000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn existing_account_loan_and_fleet_are_left_alone() {
        let bank = Arc::new(LoopbackBank::with_existing_account("ACC-1", 1_000.0));
        let vendor = Arc::new(LoopbackVendor::standard());
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_vehicle(NewVehicle {
                type_name: "large_truck".into(),
                purchase_date: today(),
                daily_operational_cost: 500.0,
                load_capacity: 5000,
            })
            .await
            .unwrap();
        let report = bootstrap(&bank, &vendor, &store).run(today()).await.unwrap();

        assert!(!report.account_created);
        assert_eq!(report.account_number, "ACC-1");
        assert!(report.loan_number.is_none());
        assert_eq!(bank.held_loans().len(), 1);
        assert!(vendor.orders().is_empty());
        assert!(bank.payments().is_empty());
    }

    #[tokio::test]
    async fn unknown_truck_aborts_before_borrowing() {
        let bank = Arc::new(LoopbackBank::new());
        let vendor = Arc::new(LoopbackVendor::standard());
        let store = Arc::new(InMemoryStore::new());
        let err = bootstrap(&bank, &vendor, &store)
            .initial_fleet(vec![FleetOrder::new("hovercraft", 1)])
            .run(today())
            .await
            .unwrap_err();
        assert!(matches!(err, AutonomyError::Bootstrap(_)));
        assert!(bank.held_loans().is_empty());
    }

    #[tokio::test]
    async fn offline_bank_propagates() {
        let bank = Arc::new(LoopbackBank::new());
        bank.set_offline(true);
        let vendor = Arc::new(LoopbackVendor::standard());
        let store = Arc::new(InMemoryStore::new());
        let err = bootstrap(&bank, &vendor, &store).run(today()).await.unwrap_err();
        assert!(matches!(err, AutonomyError::Service(_)));
    }
}
