//! Mean, median, population standard deviation, representative run.

use riskwatch_core::{Error, Result, Run};
use serde::{Deserialize, Serialize};

/// Summary statistics of a set of estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub average: f64,
    pub median: f64,
    /// Population standard deviation (divides by `n`, not `n - 1`).
    pub stddev: f64,
}

fn check_estimates(estimates: &[f64]) -> Result<()> {
    if estimates.is_empty() {
        return Err(Error::Input("cannot aggregate zero estimates".into()));
    }
    if let Some(bad) = estimates.iter().find(|v| !v.is_finite()) {
        return Err(Error::Input(format!("non-finite estimate {}", bad)));
    }
    Ok(())
}

/// Median of `estimates`: middle element when odd, mean of the two middle ones when even.
pub fn median(estimates: &[f64]) -> Result<f64> {
    check_estimates(estimates)?;
    let mut sorted = estimates.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Ok(if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    })
}

pub fn compute_stats(estimates: &[f64]) -> Result<Stats> {
    check_estimates(estimates)?;
    let n = estimates.len() as f64;
    let average = estimates.iter().sum::<f64>() / n;
    let variance = estimates
        .iter()
        .map(|v| (v - average).powi(2))
        .sum::<f64>()
        / n;
    Ok(Stats {
        average,
        median: median(estimates)?,
        stddev: variance.sqrt(),
    })
}

/// Index of the estimate nearest the median. Ties go to the lowest index.
pub fn representative_index(estimates: &[f64]) -> Result<usize> {
    let m = median(estimates)?;
    let mut best = 0;
    let mut best_delta = f64::INFINITY;
    for (i, v) in estimates.iter().enumerate() {
        let delta = (v - m).abs();
        // Strict comparison keeps the first occurrence on ties.
        if delta < best_delta {
            best = i;
            best_delta = delta;
        }
    }
    Ok(best)
}

/// The run whose estimate is nearest the median of `estimates`.
///
/// `estimates` and `runs` must be index-aligned.
pub fn pick_representative<'a>(estimates: &[f64], runs: &'a [Run]) -> Result<&'a Run> {
    if estimates.len() != runs.len() {
        return Err(Error::Input(format!(
            "{} estimates but {} runs",
            estimates.len(),
            runs.len()
        )));
    }
    let index = representative_index(estimates)?;
    Ok(&runs[index])
}
