//! Strict decoding of an estimator response into a typed estimate.

use once_cell::sync::Lazy;
use regex::Regex;
use riskwatch_core::{Citation, Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// Terminal JSON object that mentions `probability`, anchored at the end of the text.
static TERMINAL_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)\{.*"probability".*\}\s*$"#).unwrap());

/// A decoded, validated estimate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SingleEstimate {
    pub probability: f64,
    pub report: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl SingleEstimate {
    fn validate(self) -> Result<Self> {
        if !self.probability.is_finite() || !(0.0..=1.0).contains(&self.probability) {
            return Err(Error::Estimator(format!(
                "probability {} outside [0, 1]",
                self.probability
            )));
        }
        Ok(self)
    }
}

/// Decode a Responses API body: collect output text, then parse its terminal JSON block.
pub fn decode_response(body: &Value) -> Result<SingleEstimate> {
    let text = extract_output_text(body)?;
    decode_text(&text)
}

/// Concatenate every `output_text` part of every `message` output item.
pub fn extract_output_text(body: &Value) -> Result<String> {
    let output = match body["output"].as_array() {
        Some(items) if !items.is_empty() => items,
        _ => return Err(Error::Estimator("response missing output".into())),
    };

    let mut buf = String::new();
    for item in output.iter().filter(|i| i["type"] == "message") {
        let Some(parts) = item["content"].as_array() else {
            continue;
        };
        for part in parts {
            if part["type"] == "output_text" {
                if let Some(text) = part["text"].as_str() {
                    buf.push_str(text);
                }
            }
        }
    }

    let text = buf.trim();
    if text.is_empty() {
        return Err(Error::Estimator("response contained no output_text".into()));
    }
    Ok(text.to_string())
}

/// Parse the terminal JSON block of `text` into a validated estimate.
pub fn decode_text(text: &str) -> Result<SingleEstimate> {
    let block = TERMINAL_JSON_RE
        .find(text)
        .ok_or_else(|| Error::Estimator("response missing terminal JSON block".into()))?
        .as_str()
        .trim_end();

    // Prose before the block may contain braces; try each opening brace in turn.
    let mut last_err = None;
    for (start, _) in block.match_indices('{') {
        let candidate = &block[start..];
        if !candidate.contains("\"probability\"") {
            break;
        }
        match serde_json::from_str::<SingleEstimate>(candidate) {
            Ok(estimate) => return estimate.validate(),
            Err(e) => last_err = Some(e),
        }
    }

    Err(Error::Estimator(format!(
        "terminal JSON did not match schema: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}
