//! Riskwatch Estimator: one probabilistic risk estimate per call.
//!
//! Provides the `Estimator` trait consumed by the runtime. The production
//! implementation, `OpenAiEstimator`, asks a reasoning model through the
//! OpenAI Responses API and strictly decodes the terminal JSON block of its
//! answer. Every failure, transport or validation, is an estimator error.

pub mod decode;
pub mod openai;
pub mod prompt;
pub mod scripted;

pub use decode::{decode_response, SingleEstimate};
pub use openai::OpenAiEstimator;
pub use scripted::ScriptedEstimator;

use std::sync::Arc;

use async_trait::async_trait;
use riskwatch_core::config::EstimatorSettings;
use riskwatch_core::{Result, Run};

/// Source of independent estimates.
#[async_trait]
pub trait Estimator: Send + Sync {
    /// Produce one validated run. No retries.
    async fn estimate(&self) -> Result<Run>;

    /// Model identifier recorded on snapshots.
    fn model(&self) -> &str;
}

/// Create the estimator described by `settings`.
pub fn create_estimator(settings: &EstimatorSettings) -> Result<Arc<dyn Estimator>> {
    let estimator = OpenAiEstimator::new(settings)?;
    tracing::info!("Using OpenAI estimator (model={})", estimator.model());
    Ok(Arc::new(estimator))
}
