//! Scripted estimator that replays a fixed sequence of outcomes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use riskwatch_core::{Citation, Error, Result, Run};

use crate::Estimator;

/// Estimator for tests and offline runs: pops queued outcomes in order,
/// then falls back to a fixed probability if one is set.
pub struct ScriptedEstimator {
    model: String,
    script: Mutex<VecDeque<std::result::Result<f64, String>>>,
    fallback: Option<f64>,
    calls: AtomicUsize,
}

impl ScriptedEstimator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue successful estimates with the given probabilities.
    pub fn with_probabilities(self, probabilities: impl IntoIterator<Item = f64>) -> Self {
        self.script.lock().extend(probabilities.into_iter().map(Ok));
        self
    }

    /// Answer with `probability` once the queue is empty.
    pub fn repeating(mut self, probability: f64) -> Self {
        self.fallback = Some(probability);
        self
    }

    pub fn push_ok(&self, probability: f64) {
        self.script.lock().push_back(Ok(probability));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.script.lock().push_back(Err(message.into()));
    }

    /// Number of `estimate` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Estimator for ScriptedEstimator {
    async fn estimate(&self) -> Result<Run> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        let probability = match next {
            Some(Ok(p)) => p,
            Some(Err(msg)) => return Err(Error::Estimator(msg)),
            None => self
                .fallback
                .ok_or_else(|| Error::Estimator("script exhausted".into()))?,
        };
        Ok(Run {
            probability,
            report: format!("Scripted estimate #{} at {:.3}", call, probability),
            citations: vec![Citation {
                url: format!("https://example.org/source/{}", call),
                title: None,
            }],
            computed_at: Utc::now(),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
