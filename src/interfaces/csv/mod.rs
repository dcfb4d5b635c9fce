//! CSV input of settlement batches and output of the final payment statuses.

pub mod settlement_reader;
pub mod status_writer;
