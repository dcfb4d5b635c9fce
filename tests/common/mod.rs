#![allow(dead_code)]

use rust_decimal_macros::dec;
use settlement_recon::domain::payment::{Amount, Payment};
use std::io::{Error, Write};
use std::path::Path;

pub const HEADER: &str =
    "id,from_user_id,to_user_id,amount,currency,gateway_status,receiver_account";

pub fn payment(id: &str) -> Payment {
    let amount = Amount::new(dec!(100.0)).unwrap();
    Payment::new(id, "userA", "userB", amount, "RUB")
}

/// Writes a settlement batch with the standard header and the given rows.
pub fn write_batch(rows: &[&str]) -> tempfile::NamedTempFile {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(csv, "{}", row).unwrap();
    }
    csv.flush().unwrap();
    csv
}

/// Generates `rows` payments the gateway already reports as paid.
pub fn generate_settled_batch(path: &Path, rows: usize) -> Result<(), Error> {
    let file = std::fs::File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER.split(','))?;

    for i in 1..=rows {
        let receiver = format!("user{}", i % 50);
        let account = format!("acct-{}", i % 50);
        wtr.write_record([
            format!("p{:06}", i).as_str(),
            "payer",
            receiver.as_str(),
            "1.0",
            "RUB",
            "success",
            account.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
