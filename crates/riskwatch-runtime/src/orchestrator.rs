//! Top-up orchestrator: grows a day's run set in bounded batches.
//!
//! Each invocation fetches at most `per_request_cap` runs, one estimator
//! call at a time, and archives every run before asking for the next. An
//! invocation cut short by the host's time limit loses at most the call in
//! flight; the next invocation picks up from whatever the archive holds.

use std::sync::Arc;

use chrono::NaiveDate;
use riskwatch_core::{DailySnapshot, Error, Result, Run};
use riskwatch_estimator::Estimator;
use riskwatch_store::{RunArchive, RunListing, StorageBackend};
use tracing::{info, warn};

use crate::reconciler::Reconciler;

/// Number of runs to fetch: the shortfall toward `goal`, capped per request.
pub fn runs_to_fetch(goal: usize, existing: usize, per_request_cap: usize) -> usize {
    goal.saturating_sub(existing).min(per_request_cap)
}

pub struct Orchestrator {
    archive: RunArchive,
    reconciler: Reconciler,
    estimator: Arc<dyn Estimator>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn StorageBackend>, estimator: Arc<dyn Estimator>) -> Self {
        let archive = RunArchive::new(store);
        let reconciler = Reconciler::new(archive.clone()).with_model(estimator.model());
        info!(
            "Orchestrator initialized: storage={}, model={}",
            archive.store().name(),
            estimator.model()
        );
        Self {
            archive,
            reconciler,
            estimator,
        }
    }

    pub fn archive(&self) -> &RunArchive {
        &self.archive
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Bring `date` toward `goal_runs`, fetching at most `per_request_cap` new runs.
    ///
    /// Once the archive holds the goal, this appends nothing and returns the
    /// existing snapshot untouched (rebuilt only if the cache is missing or stale).
    pub async fn ensure_daily_with_goal(
        &self,
        date: NaiveDate,
        goal_runs: u32,
        per_request_cap: u32,
    ) -> Result<DailySnapshot> {
        if goal_runs == 0 {
            return Err(Error::Input("goal must be at least 1 run".into()));
        }
        if per_request_cap == 0 {
            return Err(Error::Input("per-request cap must be at least 1 run".into()));
        }

        let existing = self.archive.listing(date).await?;
        let to_run = runs_to_fetch(
            goal_runs as usize,
            existing.runs.len(),
            per_request_cap as usize,
        );
        info!(
            "ensure {}: {} archived, goal {}, fetching {}",
            date,
            existing.runs.len(),
            goal_runs,
            to_run
        );

        if to_run == 0 {
            return self
                .reconciler
                .load_snapshot(date)
                .await?
                .ok_or_else(|| Error::Input(format!("no runs archived for {}", date)));
        }

        self.fetch_and_append(date, existing, to_run).await
    }

    /// Fetch exactly `how_many` new runs for `date`, regardless of any goal.
    pub async fn append_runs(&self, date: NaiveDate, how_many: u32) -> Result<DailySnapshot> {
        if how_many == 0 {
            return Err(Error::Input("must append at least 1 run".into()));
        }
        let existing = self.archive.listing(date).await?;
        info!(
            "append {}: {} archived, fetching {}",
            date,
            existing.runs.len(),
            how_many
        );
        self.fetch_and_append(date, existing, how_many as usize).await
    }

    /// Archived runs for `date`, in index order.
    pub async fn list_runs(&self, date: NaiveDate) -> Result<Vec<Run>> {
        self.archive.list_runs(date).await
    }

    /// Reconciled snapshot for `date`, or None if nothing is archived.
    pub async fn load_snapshot(&self, date: NaiveDate) -> Result<Option<DailySnapshot>> {
        self.reconciler.load_snapshot(date).await
    }

    /// Sequentially estimate and archive `to_run` runs, then recompute and
    /// persist the snapshot over the full set.
    async fn fetch_and_append(
        &self,
        date: NaiveDate,
        existing: RunListing,
        to_run: usize,
    ) -> Result<DailySnapshot> {
        let RunListing { listed, mut runs } = existing;
        for i in 0..to_run {
            let run = match self.estimator.estimate().await {
                Ok(run) => run,
                Err(e) => {
                    warn!(
                        "Estimate {}/{} for {} failed after {} archived this batch: {}",
                        i + 1,
                        to_run,
                        date,
                        i,
                        e
                    );
                    return Err(e);
                }
            };
            self.archive.append_run(date, &run).await?;
            runs.push(run);
        }

        let snapshot = self.reconciler.build_snapshot(date, runs, listed + to_run)?;
        self.reconciler.persist_snapshot(&snapshot).await?;
        info!(
            "Snapshot for {}: runs={} avg={:.3} median={:.3} sd={:.3}",
            date, snapshot.run_count, snapshot.average, snapshot.median, snapshot.stddev
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskwatch_estimator::ScriptedEstimator;
    use riskwatch_store::{keys, MemoryBackend};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn setup(estimator: ScriptedEstimator) -> (Arc<MemoryBackend>, Arc<ScriptedEstimator>, Orchestrator) {
        let mem = Arc::new(MemoryBackend::new());
        let est = Arc::new(estimator);
        let orch = Orchestrator::new(mem.clone(), est.clone());
        (mem, est, orch)
    }

    #[test]
    fn test_runs_to_fetch() {
        assert_eq!(runs_to_fetch(5, 0, 2), 2);
        assert_eq!(runs_to_fetch(5, 4, 2), 1);
        assert_eq!(runs_to_fetch(5, 5, 2), 0);
        assert_eq!(runs_to_fetch(5, 9, 2), 0);
    }

    #[tokio::test]
    async fn test_invalid_goal_and_cap() {
        let (_mem, est, orch) = setup(ScriptedEstimator::new("s").repeating(0.1));
        assert!(matches!(
            orch.ensure_daily_with_goal(day(), 0, 2).await,
            Err(Error::Input(_))
        ));
        assert!(matches!(
            orch.ensure_daily_with_goal(day(), 5, 0).await,
            Err(Error::Input(_))
        ));
        assert!(matches!(orch.append_runs(day(), 0).await, Err(Error::Input(_))));
        assert_eq!(est.calls(), 0);
    }

    #[tokio::test]
    async fn test_goal_reached_makes_no_calls() {
        let (_mem, est, orch) = setup(ScriptedEstimator::new("s").repeating(0.2));
        let first = orch.ensure_daily_with_goal(day(), 2, 5).await.unwrap();
        assert_eq!(first.run_count, 2);
        assert_eq!(est.calls(), 2);

        let again = orch.ensure_daily_with_goal(day(), 1, 5).await.unwrap();
        assert_eq!(est.calls(), 2);
        assert_eq!(again.run_count, 2);
        assert_eq!(again.computed_at, first.computed_at);
    }

    #[tokio::test]
    async fn test_goal_met_with_corrupt_run_is_read_only() {
        let (mem, est, orch) = setup(ScriptedEstimator::new("s").repeating(0.4));
        orch.append_runs(day(), 2).await.unwrap();
        mem.put(&keys::run_key(day(), 2), b"garbage".to_vec())
            .await
            .unwrap();

        let topped = orch.ensure_daily_with_goal(day(), 3, 5).await.unwrap();
        assert_eq!(topped.run_count, 3);
        assert_eq!(topped.archived_count, Some(4));
        assert_eq!(est.calls(), 3);

        mem.set_fail_writes(true);
        let again = orch.ensure_daily_with_goal(day(), 3, 5).await.unwrap();
        assert_eq!(again.computed_at, topped.computed_at);
        assert_eq!(est.calls(), 3);
    }

    #[tokio::test]
    async fn test_failure_mid_batch_keeps_earlier_runs() {
        let est = ScriptedEstimator::new("s").with_probabilities([0.1, 0.2]);
        est.push_err("upstream timeout");
        let (_mem, est, orch) = setup(est);

        let err = orch.ensure_daily_with_goal(day(), 5, 5).await.unwrap_err();
        assert!(err.is_estimator());
        assert_eq!(est.calls(), 3);
        assert_eq!(orch.list_runs(day()).await.unwrap().len(), 2);

        // The next read reconciles the two archived runs.
        let snapshot = orch.load_snapshot(day()).await.unwrap().unwrap();
        assert_eq!(snapshot.run_count, 2);
    }

    #[tokio::test]
    async fn test_storage_failure_stops_batch() {
        let (mem, est, orch) = setup(ScriptedEstimator::new("s").repeating(0.3));
        mem.set_fail_writes(true);
        let err = orch.append_runs(day(), 3).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(est.calls(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_covers_existing_and_new_runs() {
        let (_mem, _est, orch) = setup(
            ScriptedEstimator::new("s").with_probabilities([0.1, 0.9, 0.2]),
        );
        orch.append_runs(day(), 2).await.unwrap();
        let snapshot = orch.append_runs(day(), 1).await.unwrap();
        assert_eq!(snapshot.estimates, vec![0.1, 0.9, 0.2]);
        assert_eq!(snapshot.median, 0.2);
        assert_eq!(snapshot.runs.as_ref().map(Vec::len), Some(3));
        assert!(snapshot.representative_report.contains("0.200"));
    }
}
