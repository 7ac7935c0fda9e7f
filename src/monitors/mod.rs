//! Per-server probes and per-application aggregation

pub mod aggregate;
pub mod probe;

pub use aggregate::Aggregate;
pub use probe::{NetworkProber, ProbeOutcome, Prober};
