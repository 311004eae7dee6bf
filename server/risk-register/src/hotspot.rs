//! Hotspot ranking: churn, complexity, coverage and criticality folded into one weighted score.
//!
//! Every factor is normalized against the largest observed value (floored at 1) so the
//! score lands in 0..=1 once the weights sum to 1.

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::config::WeightSet;
use crate::error::EngineError;
use crate::types::{ComplexityBlock, HotspotInputs, HotspotMeta, HotspotReport, MetricRecord, ScoreComponents};

/// Coverage assumed for files without coverage data ("unknown, moderately risky").
pub const DEFAULT_COVERAGE: f64 = 0.5;
/// Criticality tier assumed for files without an explicit tier.
pub const DEFAULT_CRITICALITY: f64 = 1.0;

/// Score every file mentioned in any input map and keep the `top_n` riskiest.
pub fn rank(
  inputs: &HotspotInputs,
  weights: &WeightSet,
  top_n: usize,
) -> Result<HotspotReport, EngineError> {
  validate(inputs)?;

  let max_churn = inputs.churn.values().copied().max().unwrap_or(0).max(1) as f64;
  let max_complexity = inputs
    .complexity
    .values()
    .map(|blocks| average(blocks))
    .fold(0.0_f64, f64::max)
    .max(1.0);
  let max_criticality = inputs
    .criticality
    .values()
    .copied()
    .fold(0.0_f64, f64::max)
    .max(1.0);
  debug!(max_churn, max_complexity, max_criticality, "hotspot normalization bounds");

  // Encounter order doubles as the tie-break order for the stable sort below.
  let universe: IndexSet<&str> = inputs
    .churn
    .keys()
    .chain(inputs.complexity.keys())
    .chain(inputs.coverage.keys())
    .chain(inputs.criticality.keys())
    .map(String::as_str)
    .collect();

  let mut records: Vec<MetricRecord> = universe
    .iter()
    .map(|file| {
      let churn = inputs.churn.get(*file).copied().unwrap_or(0);
      let avg_complexity = inputs.complexity.get(*file).map_or(0.0, |b| average(b));
      let coverage = inputs.coverage.get(*file).copied().unwrap_or(DEFAULT_COVERAGE);
      let criticality = inputs
        .criticality
        .get(*file)
        .copied()
        .unwrap_or(DEFAULT_CRITICALITY);

      let components = ScoreComponents {
        churn: round_to(churn as f64 / max_churn * weights.churn, 4),
        complexity: round_to(avg_complexity / max_complexity * weights.complexity, 4),
        coverage_penalty: round_to((1.0 - coverage) * weights.coverage, 4),
        criticality_factor: round_to(criticality / max_criticality * weights.criticality, 4),
      };
      let risk_score = round_to(
        churn as f64 / max_churn * weights.churn
          + avg_complexity / max_complexity * weights.complexity
          + (1.0 - coverage) * weights.coverage
          + criticality / max_criticality * weights.criticality,
        4,
      );

      MetricRecord {
        file: (*file).to_string(),
        churn,
        avg_complexity: round_to(avg_complexity, 2),
        coverage: round_to(coverage, 3),
        criticality,
        risk_score,
        components,
      }
    })
    .collect();

  records.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
  let scored = records.len();
  records.truncate(top_n);
  info!(scored, kept = records.len(), "ranked hotspots");

  Ok(HotspotReport {
    meta: HotspotMeta { weights: *weights },
    hotspots: records,
  })
}

/// Mean block complexity; a file with no blocks scores 0.
fn average(blocks: &[ComplexityBlock]) -> f64 {
  if blocks.is_empty() {
    return 0.0;
  }
  blocks.iter().map(|b| b.complexity).sum::<f64>() / blocks.len() as f64
}

/// Round half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
  let factor = 10_f64.powi(places);
  (value * factor).round() / factor
}

fn validate(inputs: &HotspotInputs) -> Result<(), EngineError> {
  for (file, blocks) in &inputs.complexity {
    if blocks.iter().any(|b| !b.complexity.is_finite() || b.complexity < 0.0) {
      return Err(EngineError::validation(
        &format!("complexity[{}]", file),
        "block complexity must be a non-negative number",
      ));
    }
  }
  for (file, &cov) in &inputs.coverage {
    if !(0.0..=1.0).contains(&cov) {
      return Err(EngineError::validation(
        &format!("coverage[{}]", file),
        "coverage must be a fraction within 0..=1",
      ));
    }
  }
  for (file, &crit) in &inputs.criticality {
    if !crit.is_finite() || crit < 0.0 {
      return Err(EngineError::validation(
        &format!("criticality[{}]", file),
        "criticality must be a non-negative number",
      ));
    }
  }
  Ok(())
}
