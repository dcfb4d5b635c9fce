use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::PaymentStore;
use crate::error::{ReconError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing payment records.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent payment store implementation using RocksDB.
///
/// Payments are stored as JSON under their id in the "payments" column family.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbPaymentStore {
    db: Arc<DB>,
}

impl RocksDbPaymentStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_payments = ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_payments])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn write(&self, payment: &Payment) -> Result<()> {
        let cf = self.payments_cf()?;
        let value = serde_json::to_vec(payment).map_err(|e| {
            ReconError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;
        self.db.put_cf(&cf, payment.id.as_bytes(), value)?;
        Ok(())
    }

    fn payments_cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(CF_PAYMENTS).ok_or_else(|| {
            ReconError::InternalError(Box::new(std::io::Error::other(
                "Payments column family not found",
            )))
        })
    }
}

fn decode(bytes: &[u8]) -> Result<Payment> {
    serde_json::from_slice(bytes).map_err(|e| {
        ReconError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl PaymentStore for RocksDbPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        self.write(&payment)
    }

    async fn get(&self, payment_id: &str) -> Result<Payment> {
        let cf = self.payments_cf()?;
        match self.db.get_cf(&cf, payment_id.as_bytes())? {
            Some(bytes) => decode(&bytes),
            None => Err(ReconError::NotFound(payment_id.to_string())),
        }
    }

    async fn update_status(&self, payment_id: &str, status: PaymentStatus) -> Result<()> {
        let mut payment = self.get(payment_id).await?;
        payment.status = status;
        payment.updated_at = Utc::now();
        self.write(&payment)
    }

    async fn all(&self) -> Result<Vec<Payment>> {
        let cf = self.payments_cf()?;
        let mut payments = Vec::new();

        // Keys are payment ids, so iteration order is already sorted by id.
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            payments.push(decode(&value)?);
        }

        Ok(payments)
    }
}
