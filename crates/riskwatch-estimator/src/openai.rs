//! OpenAI Responses API estimator.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use riskwatch_core::config::EstimatorSettings;
use riskwatch_core::date::today_utc;
use riskwatch_core::{Error, Result, Run};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::decode::decode_response;
use crate::prompt::build_prompt;
use crate::Estimator;

pub struct OpenAiEstimator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEstimator {
    pub fn new(settings: &EstimatorSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".into()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("estimator client: {}", e)))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
        })
    }

    /// Deep-research models get search tools; other models get high reasoning effort.
    fn request_body(&self, prompt: &str) -> Value {
        let input = json!([{"role": "user", "content": prompt}]);
        if self.model.contains("deep-research") {
            json!({
                "model": self.model,
                "input": input,
                "tools": [
                    {"type": "web_search_preview"},
                    {"type": "code_interpreter", "container": {"type": "auto"}},
                ],
            })
        } else {
            json!({
                "model": self.model,
                "input": input,
                "reasoning": {"effort": "high"},
            })
        }
    }
}

#[async_trait]
impl Estimator for OpenAiEstimator {
    async fn estimate(&self) -> Result<Run> {
        let url = format!("{}/responses", self.base_url);
        let body = self.request_body(&build_prompt(today_utc()));

        debug!("Requesting estimate from {} with model {}", url, self.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Estimator(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("Estimator API error {}", status);
            return Err(Error::Estimator(format!("API error {}: {}", status, text)));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::Estimator(format!("Malformed response body: {}", e)))?;

        let estimate = decode_response(&payload).map_err(|e| {
            error!("Estimator output rejected: {}", e);
            e
        })?;

        Ok(Run {
            probability: estimate.probability,
            report: estimate.report,
            citations: estimate.citations,
            computed_at: Utc::now(),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
