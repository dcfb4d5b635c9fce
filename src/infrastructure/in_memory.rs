use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{
    IdentityResolver, PaymentStore, PaymentStoreRef, StatusOracle, TransferIssuer,
};
use crate::domain::settlement::{ExternalStatus, TransferOutcome};
use crate::error::{ReconError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory payment store.
///
/// Uses `Arc<RwLock<HashMap<String, Payment>>>` to allow shared concurrent access.
/// Every status update is also appended to a per-payment history so tests and
/// operators can audit what the worker did.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<String, Payment>>>,
    history: Arc<RwLock<HashMap<String, Vec<PaymentStatus>>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Status updates applied to `payment_id`, oldest first.
    pub async fn status_history(&self, payment_id: &str) -> Vec<PaymentStatus> {
        let history = self.history.read().await;
        history.get(payment_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id.clone(), payment);
        Ok(())
    }

    async fn get(&self, payment_id: &str) -> Result<Payment> {
        let payments = self.payments.read().await;
        payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| ReconError::NotFound(payment_id.to_string()))
    }

    async fn update_status(&self, payment_id: &str, status: PaymentStatus) -> Result<()> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(payment_id)
            .ok_or_else(|| ReconError::NotFound(payment_id.to_string()))?;
        payment.status = status;
        payment.updated_at = Utc::now();

        let mut history = self.history.write().await;
        history.entry(payment_id.to_string()).or_default().push(status);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut all: Vec<Payment> = payments.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

/// Raw status of an incoming payment as reported by the wallet gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Success,
    #[serde(alias = "pending")]
    InProgress,
    #[serde(alias = "failed")]
    Refused,
}

/// Status oracle backed by an in-memory gateway feed.
///
/// Converges the store with the gateway on every check: a settled payment
/// already marked `COMPLETE` (or `REFUNDED`) is reported as terminal, anything
/// else is written back as `SUCCESS`, `PENDING` or `FAILED`.
#[derive(Clone)]
pub struct InMemoryStatusOracle {
    gateway: Arc<RwLock<HashMap<String, GatewayStatus>>>,
    store: PaymentStoreRef,
}

impl InMemoryStatusOracle {
    pub fn new(store: PaymentStoreRef) -> Self {
        Self {
            gateway: Arc::new(RwLock::new(HashMap::new())),
            store,
        }
    }

    /// Records the gateway status for a payment label.
    pub async fn report(&self, payment_id: impl Into<String>, status: GatewayStatus) {
        let mut gateway = self.gateway.write().await;
        gateway.insert(payment_id.into(), status);
    }
}

#[async_trait]
impl StatusOracle for InMemoryStatusOracle {
    async fn check_status(&self, payment_id: &str) -> Result<ExternalStatus> {
        let gateway_status = self
            .gateway
            .read()
            .await
            .get(payment_id)
            .copied()
            .ok_or_else(|| {
                ReconError::OracleError(format!("no operations found for label: {}", payment_id))
            })?;

        match gateway_status {
            GatewayStatus::Success => {
                let payment = self.store.get(payment_id).await?;
                match payment.status {
                    PaymentStatus::Complete => Ok(ExternalStatus::Complete),
                    PaymentStatus::Refunded => Ok(ExternalStatus::Refunded),
                    _ => {
                        self.store
                            .update_status(payment_id, PaymentStatus::Success)
                            .await?;
                        Ok(ExternalStatus::Success)
                    }
                }
            }
            GatewayStatus::InProgress => {
                self.store
                    .update_status(payment_id, PaymentStatus::Pending)
                    .await?;
                Ok(ExternalStatus::Pending)
            }
            GatewayStatus::Refused => {
                self.store
                    .update_status(payment_id, PaymentStatus::Failed)
                    .await?;
                Ok(ExternalStatus::Failed)
            }
        }
    }
}

/// Identity directory mapping user ids to external wallet accounts.
#[derive(Default, Clone)]
pub struct InMemoryIdentityResolver {
    accounts: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: impl Into<String>, account: impl Into<String>) {
        let mut accounts = self.accounts.write().await;
        accounts.insert(user_id.into(), account.into());
    }
}

#[async_trait]
impl IdentityResolver for InMemoryIdentityResolver {
    async fn resolve(&self, user_id: &str) -> Result<String> {
        let accounts = self.accounts.read().await;
        accounts
            .get(user_id)
            .cloned()
            .ok_or_else(|| ReconError::IdentityError(format!("unknown user: {}", user_id)))
    }
}

/// A transfer accepted by [`InMemoryTransferIssuer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub payment_id: String,
    pub destination: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Transfer issuer that records transfers instead of moving money.
///
/// Destinations passed to [`InMemoryTransferIssuer::rejecting`] are refused,
/// which exercises the worker's compensating rollback.
#[derive(Default, Clone)]
pub struct InMemoryTransferIssuer {
    rejected: Arc<HashSet<String>>,
    issued: Arc<RwLock<Vec<Transfer>>>,
}

impl InMemoryTransferIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting<I, S>(destinations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rejected: Arc::new(destinations.into_iter().map(Into::into).collect()),
            issued: Arc::default(),
        }
    }

    /// Transfers issued so far, in issue order.
    pub async fn transfers(&self) -> Vec<Transfer> {
        self.issued.read().await.clone()
    }
}

#[async_trait]
impl TransferIssuer for InMemoryTransferIssuer {
    async fn issue(&self, payment: &Payment, destination: &str) -> Result<TransferOutcome> {
        payment.validate_for_transfer()?;

        if self.rejected.contains(destination) {
            return Ok(TransferOutcome::Failed {
                reason: format!("transfer refused: destination {} rejected", destination),
            });
        }

        let mut issued = self.issued.write().await;
        issued.push(Transfer {
            payment_id: payment.id.clone(),
            destination: destination.to_string(),
            amount: payment.amount.value(),
            currency: payment.currency.clone(),
        });
        Ok(TransferOutcome::Success)
    }
}
