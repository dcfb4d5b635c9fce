//! Domain model: payments, external settlement vocabulary and the ports the
//! reconciliation worker talks to.

pub mod payment;
pub mod ports;
pub mod settlement;
