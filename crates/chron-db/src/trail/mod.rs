//! JSONL trail mirror and replayer.
//!
//! Every recorded audit is also appended to a per-target-type JSONL file, so
//! the store can be rebuilt from plain files after loss or migration.

pub mod replayer;
pub mod writer;
