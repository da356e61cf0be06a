//! Run archive: append-only persistence of individual runs per date.
//!
//! The archive is the source of truth for a day's consensus. Each run is
//! written once at `daily/{date}/runs/{index}.json` where `index` is the
//! number of runs already listed for that date.
//!
//! Index allocation is read-count-then-write. When the backend supports
//! conditional creates, a collision moves the write to the next free index;
//! otherwise two concurrent writers for the same date can pick the same
//! index and the later write replaces the earlier one. Triggers for a date
//! are expected to come from a single scheduler.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use riskwatch_core::{Error, Result, Run};
use tracing::{debug, info, warn};

use crate::backend::{CreateOutcome, StorageBackend};
use crate::keys;

/// How many consecutive occupied indices `append_run` probes past the listed count.
pub const MAX_INDEX_PROBES: usize = 64;

const FETCH_CONCURRENCY: usize = 8;

/// Readable runs for a date alongside how many run keys were listed.
///
/// `listed` exceeds `runs.len()` when some listed entries could not be read.
#[derive(Debug, Clone, Default)]
pub struct RunListing {
    pub listed: usize,
    pub runs: Vec<Run>,
}

#[derive(Clone)]
pub struct RunArchive {
    store: Arc<dyn StorageBackend>,
}

impl RunArchive {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StorageBackend> {
        &self.store
    }

    /// Number of run objects currently listed for `date`.
    pub async fn count_existing(&self, date: NaiveDate) -> Result<usize> {
        Ok(self.run_keys(date).await?.len())
    }

    /// Persist `run` for `date` and return the index it was written at.
    ///
    /// A failed call may or may not have written the run; retrying it
    /// allocates a new index rather than overwriting.
    pub async fn append_run(&self, date: NaiveDate, run: &Run) -> Result<usize> {
        let bytes = serde_json::to_vec_pretty(run)?;
        let start = self.count_existing(date).await?;

        for index in start..start + MAX_INDEX_PROBES {
            let key = keys::run_key(date, index);
            match self.store.create_new(&key, bytes.clone()).await? {
                CreateOutcome::Created => {
                    info!(
                        "Archived run {} for {} (p={:.3})",
                        index, date, run.probability
                    );
                    return Ok(index);
                }
                CreateOutcome::Exists => {
                    debug!("Run index {} for {} already taken, probing next", index, date);
                }
                CreateOutcome::Unsupported => {
                    self.store.put(&key, bytes).await?;
                    info!(
                        "Archived run {} for {} (p={:.3}, unguarded)",
                        index, date, run.probability
                    );
                    return Ok(index);
                }
            }
        }

        Err(Error::Storage(format!(
            "no free run index for {} in {}..{}",
            date,
            start,
            start + MAX_INDEX_PROBES
        )))
    }

    /// Every readable run for `date`, in index order.
    pub async fn list_runs(&self, date: NaiveDate) -> Result<Vec<Run>> {
        Ok(self
            .list_indexed_runs(date)
            .await?
            .into_iter()
            .map(|(_, run)| run)
            .collect())
    }

    /// Readable runs for `date` together with the listed key count, from a
    /// single listing.
    pub async fn listing(&self, date: NaiveDate) -> Result<RunListing> {
        let indexed = self.run_keys(date).await?;
        let listed = indexed.len();
        let runs = self
            .fetch_runs(indexed)
            .await
            .into_iter()
            .map(|(_, run)| run)
            .collect();
        Ok(RunListing { listed, runs })
    }

    /// Every readable run for `date` paired with its archive index.
    ///
    /// Entries that vanished, fail to read, or fail to decode are skipped
    /// with a warning; only a failed listing fails the call.
    pub async fn list_indexed_runs(&self, date: NaiveDate) -> Result<Vec<(usize, Run)>> {
        let indexed = self.run_keys(date).await?;
        Ok(self.fetch_runs(indexed).await)
    }

    async fn fetch_runs(&self, indexed: Vec<(usize, String)>) -> Vec<(usize, Run)> {
        let store = &self.store;

        let fetched: Vec<Option<(usize, Run)>> = stream::iter(indexed)
            .map(move |(index, key)| async move {
                match store.get(&key).await {
                    Ok(Some(bytes)) => match decode_run(&bytes) {
                        Ok(run) => Some((index, run)),
                        Err(e) => {
                            warn!("Skipping unreadable run {}: {}", key, e);
                            None
                        }
                    },
                    Ok(None) => {
                        warn!("Skipping listed but missing run {}", key);
                        None
                    }
                    Err(e) => {
                        warn!("Skipping run {}: {}", key, e);
                        None
                    }
                }
            })
            .buffered(FETCH_CONCURRENCY)
            .collect()
            .await;

        fetched.into_iter().flatten().collect()
    }

    /// Listed run keys for `date`, sorted by index.
    async fn run_keys(&self, date: NaiveDate) -> Result<Vec<(usize, String)>> {
        let mut indexed: Vec<(usize, String)> = self
            .store
            .list(&keys::runs_prefix(date))
            .await?
            .into_iter()
            .filter_map(|key| keys::run_index(&key).map(|i| (i, key)))
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        Ok(indexed)
    }
}

fn decode_run(bytes: &[u8]) -> Result<Run> {
    let run: Run = serde_json::from_slice(bytes)?;
    if !run.probability.is_finite() || !(0.0..=1.0).contains(&run.probability) {
        return Err(Error::Storage(format!(
            "probability {} out of range",
            run.probability
        )));
    }
    Ok(run)
}
