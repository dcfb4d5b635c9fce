use crate::error::ReconError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a positive monetary amount for a payment.
///
/// This is a wrapper around `rust_decimal::Decimal` that rejects zero and
/// negative values, both on construction and on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, ReconError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(ReconError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ReconError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Settlement status of a payment as recorded by the payment store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Refunded,
    Complete,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment between two users, settled through an external wallet.
///
/// The store owns the authoritative record. Copies held by the reconciliation
/// queue are snapshots: their `status` is never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount: Amount,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new `PENDING` payment stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        from_user_id: impl Into<String>,
        to_user_id: impl Into<String>,
        amount: Amount,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            from_user_id: from_user_id.into(),
            to_user_id: to_user_id.into(),
            amount,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks that the payment carries everything a wallet transfer needs.
    pub fn validate_for_transfer(&self) -> Result<(), ReconError> {
        if self.id.is_empty() {
            return Err(ReconError::ValidationError(
                "Payment ID is required".to_string(),
            ));
        }
        if self.to_user_id.is_empty() {
            return Err(ReconError::ValidationError(
                "Recipient (to_user_id) is required".to_string(),
            ));
        }
        if self.currency.is_empty() {
            return Err(ReconError::ValidationError(
                "Currency is required".to_string(),
            ));
        }
        Ok(())
    }
}
