use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Status of a payment as reported by the external status oracle.
///
/// Unknown values are preserved in `Unexpected` so the worker can log them
/// and keep the payment queued instead of dropping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalStatus {
    Success,
    Pending,
    Failed,
    Complete,
    Refunded,
    Unexpected(String),
}

impl ExternalStatus {
    /// Terminal statuses end reconciliation without any store mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExternalStatus::Complete | ExternalStatus::Refunded)
    }
}

impl FromStr for ExternalStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "success" => ExternalStatus::Success,
            "pending" => ExternalStatus::Pending,
            "failed" => ExternalStatus::Failed,
            "complete" => ExternalStatus::Complete,
            "refunded" => ExternalStatus::Refunded,
            other => ExternalStatus::Unexpected(other.to_string()),
        })
    }
}

impl fmt::Display for ExternalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalStatus::Success => f.write_str("success"),
            ExternalStatus::Pending => f.write_str("pending"),
            ExternalStatus::Failed => f.write_str("failed"),
            ExternalStatus::Complete => f.write_str("complete"),
            ExternalStatus::Refunded => f.write_str("refunded"),
            ExternalStatus::Unexpected(other) => f.write_str(other),
        }
    }
}

/// Result of asking the transfer issuer to move funds to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Success,
    Failed { reason: String },
}
