//! Riskwatch Consensus: pure statistics over a day's runs.
//!
//! No I/O. Empty input is an input error, never a neutral default.

pub mod stats;

pub use stats::{compute_stats, median, pick_representative, representative_index, Stats};
