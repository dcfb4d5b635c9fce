use super::payment::{Payment, PaymentStatus};
use super::settlement::{ExternalStatus, TransferOutcome};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Reports the external (gateway) status of a payment.
#[async_trait]
pub trait StatusOracle: Send + Sync {
    async fn check_status(&self, payment_id: &str) -> Result<ExternalStatus>;
}

/// Authoritative record of payments and their settlement status.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: Payment) -> Result<()>;
    /// Fails with `ReconError::NotFound` for an unknown id.
    async fn get(&self, payment_id: &str) -> Result<Payment>;
    async fn update_status(&self, payment_id: &str, status: PaymentStatus) -> Result<()>;
    async fn all(&self) -> Result<Vec<Payment>>;
}

/// Maps an internal user id to the external account that receives funds.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, user_id: &str) -> Result<String>;
}

/// Moves settled funds to the receiver's external account.
#[async_trait]
pub trait TransferIssuer: Send + Sync {
    async fn issue(&self, payment: &Payment, destination: &str) -> Result<TransferOutcome>;
}

pub type StatusOracleRef = Arc<dyn StatusOracle>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type IdentityResolverRef = Arc<dyn IdentityResolver>;
pub type TransferIssuerRef = Arc<dyn TransferIssuer>;
