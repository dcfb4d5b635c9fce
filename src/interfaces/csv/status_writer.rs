use crate::domain::payment::{Payment, PaymentStatus};
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct StatusRow<'a> {
    id: &'a str,
    status: PaymentStatus,
    amount: Decimal,
    currency: &'a str,
}

/// Writes the final status of each payment as CSV.
pub struct StatusWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatusWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(sink),
        }
    }

    /// Writes a header followed by one row per payment, then flushes.
    pub fn write_payments<'a, I>(&mut self, payments: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Payment>,
    {
        self.writer
            .write_record(["id", "status", "amount", "currency"])?;
        for payment in payments {
            self.writer.serialize(StatusRow {
                id: &payment.id,
                status: payment.status,
                amount: payment.amount.value(),
                currency: &payment.currency,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
