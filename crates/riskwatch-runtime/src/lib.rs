//! Riskwatch Runtime: run accumulation and daily consensus.
//!
//! The `Orchestrator` grows a day's run set toward a goal across many
//! short invocations, persisting each run as soon as it arrives. The
//! `Reconciler` rebuilds the canonical snapshot from the archive whenever
//! the cached one is missing, unreadable or stale. The `IntradaySampler`
//! turns runs and snapshots into 10-minute time-series points.

pub mod orchestrator;
pub mod reconciler;
pub mod sampler;
pub mod tick;

pub use orchestrator::{runs_to_fetch, Orchestrator};
pub use reconciler::Reconciler;
pub use sampler::IntradaySampler;
pub use tick::{Tick, TickOutcome};
