//! Intraday sampler: 10-minute time-series points from runs and snapshots.
//!
//! Samples are keyed by `(date, HHMM)` of their bucket; a second sample in
//! the same bucket replaces the first.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use riskwatch_core::date::{bucket_label, floor_to_bucket};
use riskwatch_core::{DailySnapshot, IntradaySample, Result, Run};
use riskwatch_store::{keys, StorageBackend};
use tracing::{debug, warn};

pub struct IntradaySampler {
    store: Arc<dyn StorageBackend>,
}

impl IntradaySampler {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self { store }
    }

    /// Record `run` in the current bucket.
    pub async fn sample_from_run(&self, run: &Run) -> Result<IntradaySample> {
        self.sample_from_run_at(run, Utc::now()).await
    }

    pub async fn sample_from_run_at(&self, run: &Run, now: DateTime<Utc>) -> Result<IntradaySample> {
        let at = floor_to_bucket(now);
        self.record(IntradaySample {
            date: at.date_naive(),
            at,
            probability: run.probability,
            median: None,
            run_count: None,
            report: Some(run.report.clone()),
            citations: Some(run.citations.clone()),
        })
        .await
    }

    /// Record the snapshot's aggregate in the current bucket.
    pub async fn sample_from_snapshot(&self, snapshot: &DailySnapshot) -> Result<IntradaySample> {
        self.sample_from_snapshot_at(snapshot, Utc::now()).await
    }

    pub async fn sample_from_snapshot_at(
        &self,
        snapshot: &DailySnapshot,
        now: DateTime<Utc>,
    ) -> Result<IntradaySample> {
        let at = floor_to_bucket(now);
        self.record(IntradaySample {
            date: at.date_naive(),
            at,
            probability: snapshot.average,
            median: Some(snapshot.median),
            run_count: Some(snapshot.run_count),
            report: Some(snapshot.representative_report.clone()),
            citations: Some(snapshot.representative_citations.clone()),
        })
        .await
    }

    /// Record an explicit "no data" point for a tick whose estimate failed.
    pub async fn blank_sample(&self) -> Result<IntradaySample> {
        self.blank_sample_at(Utc::now()).await
    }

    pub async fn blank_sample_at(&self, now: DateTime<Utc>) -> Result<IntradaySample> {
        let at = floor_to_bucket(now);
        self.record(IntradaySample {
            date: at.date_naive(),
            at,
            probability: 0.0,
            median: None,
            run_count: None,
            report: Some(String::new()),
            citations: Some(Vec::new()),
        })
        .await
    }

    async fn record(&self, sample: IntradaySample) -> Result<IntradaySample> {
        let key = keys::intraday_key(sample.date, &bucket_label(sample.at));
        self.store.put(&key, serde_json::to_vec_pretty(&sample)?).await?;
        debug!("Recorded intraday sample {} (p={:.3})", key, sample.probability);
        Ok(sample)
    }

    /// Samples for one date, ordered by time.
    pub async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<IntradaySample>> {
        self.list_prefix(&keys::intraday_prefix(date)).await
    }

    /// The whole series across all dates, ordered by time.
    pub async fn list_all(&self) -> Result<Vec<IntradaySample>> {
        self.list_prefix(keys::INTRADAY_PREFIX).await
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<IntradaySample>> {
        let mut samples = Vec::new();
        for key in self.store.list(prefix).await? {
            if !key.ends_with(".json") {
                continue;
            }
            match self.store.get(&key).await {
                Ok(Some(bytes)) => match serde_json::from_slice::<IntradaySample>(&bytes) {
                    Ok(sample) => samples.push(sample),
                    Err(e) => warn!("Skipping unreadable sample {}: {}", key, e),
                },
                Ok(None) => {}
                Err(e) => warn!("Skipping sample {}: {}", key, e),
            }
        }
        samples.sort_by_key(|s| s.at);
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use riskwatch_core::Citation;
    use riskwatch_store::MemoryBackend;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap()
    }

    fn run(p: f64) -> Run {
        Run {
            probability: p,
            report: "narrative".into(),
            citations: vec![Citation {
                url: "https://www.state.gov".into(),
                title: None,
            }],
            computed_at: Utc::now(),
        }
    }

    fn sampler() -> (Arc<MemoryBackend>, IntradaySampler) {
        let mem = Arc::new(MemoryBackend::new());
        (mem.clone(), IntradaySampler::new(mem))
    }

    #[tokio::test]
    async fn test_run_sample_is_bucketed() {
        let (mem, sampler) = sampler();
        let sample = sampler.sample_from_run_at(&run(0.3), at(14, 27, 31)).await.unwrap();
        assert_eq!(sample.at, at(14, 20, 0));
        assert_eq!(sample.probability, 0.3);
        assert_eq!(sample.report.as_deref(), Some("narrative"));
        assert!(mem
            .get("intraday/2025-03-01/1420.json")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_same_bucket_last_write_wins() {
        let (mem, sampler) = sampler();
        sampler.sample_from_run_at(&run(0.3), at(9, 1, 0)).await.unwrap();
        sampler.sample_from_run_at(&run(0.6), at(9, 9, 59)).await.unwrap();
        assert_eq!(mem.len(), 1);

        let series = sampler.list_all().await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].probability, 0.6);
    }

    #[tokio::test]
    async fn test_snapshot_sample_carries_aggregate() {
        let (_mem, sampler) = sampler();
        let snapshot = DailySnapshot {
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            model: None,
            run_count: 3,
            average: 0.4,
            median: 0.2,
            stddev: 0.35,
            estimates: vec![0.1, 0.2, 0.9],
            representative_report: "median narrative".into(),
            representative_citations: Vec::new(),
            computed_at: Utc::now(),
            archived_count: Some(3),
            runs: None,
        };
        let sample = sampler
            .sample_from_snapshot_at(&snapshot, at(23, 59, 59))
            .await
            .unwrap();
        assert_eq!(sample.probability, 0.4);
        assert_eq!(sample.median, Some(0.2));
        assert_eq!(sample.run_count, Some(3));
        assert_eq!(sample.report.as_deref(), Some("median narrative"));
        assert_eq!(sample.at, at(23, 50, 0));
    }

    #[tokio::test]
    async fn test_blank_sample() {
        let (_mem, sampler) = sampler();
        let sample = sampler.blank_sample_at(at(0, 4, 0)).await.unwrap();
        assert!(sample.is_blank());
        assert_eq!(sample.at, at(0, 0, 0));
    }

    #[tokio::test]
    async fn test_series_ordering_and_resilience() {
        let (mem, sampler) = sampler();
        sampler.sample_from_run_at(&run(0.5), at(12, 0, 0)).await.unwrap();
        sampler.sample_from_run_at(&run(0.1), at(8, 30, 0)).await.unwrap();
        mem.put("intraday/2025-03-01/1000.json", b"garbage".to_vec())
            .await
            .unwrap();

        let series = sampler
            .list_for_date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
            .await
            .unwrap();
        let probs: Vec<f64> = series.iter().map(|s| s.probability).collect();
        assert_eq!(probs, vec![0.1, 0.5]);
    }
}
