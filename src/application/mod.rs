//! Application layer containing the reconciliation loop.
//!
//! This module defines the `ReconciliationWorker` which consumes the shared
//! `PaymentQueue` and converges each payment's stored status with the status
//! reported by the gateway, issuing the final transfer once funds arrive.

pub mod worker;
