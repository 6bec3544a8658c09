//! Analysis over stored reports.

pub mod insights;

pub use insights::*;
