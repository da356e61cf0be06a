//! Snapshot reconciler: the canonical daily snapshot as a projection of the archive.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use riskwatch_consensus::{compute_stats, pick_representative};
use riskwatch_core::{DailySnapshot, Result, Run};
use riskwatch_store::{keys, RunArchive, StorageBackend};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Reconciler {
    archive: RunArchive,
    model: Option<String>,
}

impl Reconciler {
    pub fn new(archive: RunArchive) -> Self {
        Self {
            archive,
            model: None,
        }
    }

    /// Tag snapshots built by this reconciler with the estimator model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn store(&self) -> &Arc<dyn StorageBackend> {
        self.archive.store()
    }

    /// Build a snapshot over `runs`, which must be in archive index order.
    /// `archived` is the number of run keys listed for `date` that the
    /// snapshot accounts for, including any that could not be read.
    pub fn build_snapshot(
        &self,
        date: NaiveDate,
        runs: Vec<Run>,
        archived: usize,
    ) -> Result<DailySnapshot> {
        let estimates: Vec<f64> = runs.iter().map(|r| r.probability).collect();
        let stats = compute_stats(&estimates)?;
        let representative = pick_representative(&estimates, &runs)?;

        Ok(DailySnapshot {
            date,
            model: self.model.clone(),
            run_count: estimates.len(),
            average: stats.average,
            median: stats.median,
            stddev: stats.stddev,
            representative_report: representative.report.clone(),
            representative_citations: representative.citations.clone(),
            estimates,
            computed_at: Utc::now(),
            archived_count: Some(archived.max(runs.len())),
            runs: Some(runs),
        })
    }

    /// Unconditional overwrite; the last writer wins.
    pub async fn persist_snapshot(&self, snapshot: &DailySnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.store()
            .put(&keys::snapshot_key(snapshot.date), bytes)
            .await?;
        debug!(
            "Persisted snapshot for {} (runs={})",
            snapshot.date, snapshot.run_count
        );
        Ok(())
    }

    /// The cached snapshot as stored, or None if absent or unparseable.
    pub async fn load_cached(&self, date: NaiveDate) -> Result<Option<DailySnapshot>> {
        let key = keys::snapshot_key(date);
        let Some(bytes) = self.store().get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<DailySnapshot>(&bytes) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!("Cached snapshot {} is unreadable: {}", key, e);
                Ok(None)
            }
        }
    }

    /// The snapshot for `date`, rebuilt from the archive when the cache is
    /// absent, unreadable, or accounts for fewer run keys than are listed.
    ///
    /// Snapshots written without `archived_count` are judged by `run_count`.
    pub async fn load_snapshot(&self, date: NaiveDate) -> Result<Option<DailySnapshot>> {
        let Some(cached) = self.load_cached(date).await? else {
            return self.reconstruct_from_runs(date).await;
        };

        let known = cached.archived_count.unwrap_or(cached.run_count);
        let listed = self.archive.count_existing(date).await?;
        if listed > known {
            info!(
                "Snapshot for {} is stale ({} cached, {} archived), rebuilding",
                date, known, listed
            );
            return self.reconstruct_from_runs(date).await;
        }
        if listed < known {
            warn!(
                "Archive listing for {} shows {} runs, snapshot has {}; keeping snapshot",
                date, listed, known
            );
        }
        Ok(Some(cached))
    }

    /// Rebuild the snapshot from archived runs and persist it.
    /// Returns None when the archive holds no readable runs for `date`.
    pub async fn reconstruct_from_runs(&self, date: NaiveDate) -> Result<Option<DailySnapshot>> {
        let listing = self.archive.listing(date).await?;
        if listing.runs.is_empty() {
            debug!("No archived runs for {}", date);
            return Ok(None);
        }
        let snapshot = self.build_snapshot(date, listing.runs, listing.listed)?;
        self.persist_snapshot(&snapshot).await?;
        info!(
            "Reconstructed snapshot for {} from {} runs",
            date, snapshot.run_count
        );
        Ok(Some(snapshot))
    }

    /// Every cached daily snapshot, oldest first, without embedded runs.
    pub async fn list_history(&self) -> Result<Vec<DailySnapshot>> {
        let mut dates: Vec<NaiveDate> = self
            .store()
            .list(keys::DAILY_PREFIX)
            .await?
            .iter()
            .filter_map(|key| keys::snapshot_date(key))
            .collect();
        dates.sort();
        dates.dedup();

        let mut history = Vec::with_capacity(dates.len());
        for date in dates {
            match self.load_cached(date).await {
                Ok(Some(snapshot)) => history.push(snapshot.summary()),
                Ok(None) => {}
                Err(e) => warn!("Skipping snapshot for {}: {}", date, e),
            }
        }
        Ok(history)
    }
}
