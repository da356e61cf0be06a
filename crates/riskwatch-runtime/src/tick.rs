//! One scheduled tick: grow today's run set, then record an intraday point.

use chrono::NaiveDate;
use riskwatch_core::{DailySnapshot, IntradaySample, Result};
use serde::Serialize;
use tracing::warn;

use crate::orchestrator::Orchestrator;
use crate::sampler::IntradaySampler;

/// What a tick produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutcome {
    /// Snapshot after the tick; after a failed estimate, the reconciled state of the archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily: Option<DailySnapshot>,
    pub sample: IntradaySample,
    /// Estimator failure that turned this tick into a blank sample.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Drives `append_runs` followed by an intraday sample.
pub struct Tick<'a> {
    orchestrator: &'a Orchestrator,
    sampler: &'a IntradaySampler,
}

impl<'a> Tick<'a> {
    pub fn new(orchestrator: &'a Orchestrator, sampler: &'a IntradaySampler) -> Self {
        Self {
            orchestrator,
            sampler,
        }
    }

    /// Append `batch` runs to `date` and sample the new snapshot.
    ///
    /// An estimator failure records a blank sample instead of failing the
    /// tick; storage and input failures propagate.
    pub async fn run(&self, date: NaiveDate, batch: u32) -> Result<TickOutcome> {
        match self.orchestrator.append_runs(date, batch).await {
            Ok(daily) => {
                let sample = self.sampler.sample_from_snapshot(&daily).await?;
                Ok(TickOutcome {
                    daily: Some(daily.summary()),
                    sample,
                    error: None,
                })
            }
            Err(e) if e.is_estimator() => {
                warn!("Tick for {} recorded a blank sample: {}", date, e);
                let sample = self.sampler.blank_sample().await?;
                let daily = self
                    .orchestrator
                    .load_snapshot(date)
                    .await?
                    .map(|s| s.summary());
                Ok(TickOutcome {
                    daily,
                    sample,
                    error: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }
}
