use crate::domain::payment::{Amount, Payment};
use crate::error::{ReconError, Result};
use crate::infrastructure::in_memory::GatewayStatus;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a settlement batch: a payment plus what the gateway and the
/// identity service currently say about it.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct SettlementRecord {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    /// Parsed from the field text so scale and precision survive.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
    pub gateway_status: GatewayStatus,
    /// External account of the receiver; empty when the user is unknown.
    #[serde(default)]
    pub receiver_account: Option<String>,
}

impl SettlementRecord {
    /// Builds the `PENDING` payment described by this row.
    pub fn to_payment(&self) -> Result<Payment> {
        if self.id.is_empty() {
            return Err(ReconError::ValidationError(
                "Payment ID is required".to_string(),
            ));
        }
        let amount = Amount::new(self.amount)?;
        Ok(Payment::new(
            self.id.clone(),
            self.from_user_id.clone(),
            self.to_user_id.clone(),
            amount,
            self.currency.clone(),
        ))
    }
}

/// Reads settlement records from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<SettlementRecord>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct SettlementReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> SettlementReader<R> {
    /// Creates a new `SettlementReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes records.
    pub fn records(self) -> impl Iterator<Item = Result<SettlementRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(ReconError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str =
        "id, from_user_id, to_user_id, amount, currency, gateway_status, receiver_account";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{}\np1, userA, userB, 100.50, RUB, success, acct-999\np2, userA, userC, 5, USD, in_progress,",
            HEADER
        );
        let reader = SettlementReader::new(data.as_bytes());
        let results: Vec<Result<SettlementRecord>> = reader.records().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.id, "p1");
        assert_eq!(first.amount.to_string(), "100.50");
        assert_eq!(first.gateway_status, GatewayStatus::Success);
        assert_eq!(first.receiver_account.as_deref(), Some("acct-999"));

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.gateway_status, GatewayStatus::InProgress);
        assert_eq!(second.receiver_account, None);
    }

    #[test]
    fn test_reader_keeps_every_digit() {
        let data = format!(
            "{}\np1, userA, userB, 1234567890.123456789, RUB, success, acct-1\np2, userA, userB, 0.0001, RUB, success, acct-1",
            HEADER
        );
        let reader = SettlementReader::new(data.as_bytes());
        let amounts: Vec<String> = reader
            .records()
            .map(|r| r.unwrap().amount.to_string())
            .collect();

        assert_eq!(amounts, vec!["1234567890.123456789", "0.0001"]);
        let record = SettlementReader::new(data.as_bytes())
            .records()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(
            record.to_payment().unwrap().amount.value(),
            dec!(1234567890.123456789)
        );
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{}\np1, userA, userB, 1.0, RUB, teleported, acct-1", HEADER);
        let reader = SettlementReader::new(data.as_bytes());
        let results: Vec<Result<SettlementRecord>> = reader.records().collect();

        assert!(results[0].is_err());
    }

    #[test]
    fn test_record_to_payment_rejects_non_positive_amount() {
        let data = format!("{}\np1, userA, userB, 0, RUB, success, acct-1", HEADER);
        let reader = SettlementReader::new(data.as_bytes());
        let record = reader.records().next().unwrap().unwrap();

        assert!(matches!(
            record.to_payment(),
            Err(ReconError::ValidationError(_))
        ));
    }
}
