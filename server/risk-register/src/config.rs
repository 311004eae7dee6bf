//! Engine configuration with sane defaults.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// What the nodes and edges of a drift snapshot describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphMode {
  /// Nodes are modules, edges are imports.
  #[default]
  Deps,
  /// Nodes are services, edges are calls or event flows.
  Services,
}

/// Tunable knobs for every stage. All plain scalars, built once per run.
#[derive(Debug, Clone)]
pub struct Config {
  /// Relative weight of normalized churn in the hotspot score.
  pub weight_churn: f64,
  /// Relative weight of normalized average complexity.
  pub weight_complexity: f64,
  /// Relative weight of the coverage penalty (1 - coverage).
  pub weight_coverage: f64,
  /// Relative weight of normalized criticality.
  pub weight_criticality: f64,
  /// Hotspots kept after ranking.
  pub top_n: usize,
  /// Top-author share at or above which a directory is concentrated (0..1).
  pub concentration_threshold: f64,
  /// Length of the authorship window, echoed into the ownership summary.
  pub time_window_days: u32,
  /// Leading directory segments used as the ownership bucket key.
  pub directory_depth: usize,
  /// Edge churn ratio at or above which drift breaches.
  pub drift_threshold: f64,
  pub graph_mode: GraphMode,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      weight_churn: 0.4,
      weight_complexity: 0.4,
      weight_coverage: 0.1,
      weight_criticality: 0.1,
      top_n: 50,
      concentration_threshold: 0.6,
      time_window_days: 90,
      directory_depth: 2,
      drift_threshold: 0.1,
      graph_mode: GraphMode::Deps,
    }
  }
}

impl Config {
  /// Check ranges that scoring relies on. Weights are checked by [`Config::weights`].
  pub fn validate(&self) -> Result<(), EngineError> {
    if !(0.0..=1.0).contains(&self.concentration_threshold) {
      return Err(EngineError::validation(
        "concentration_threshold",
        "must be within 0..=1",
      ));
    }
    if self.directory_depth == 0 {
      return Err(EngineError::validation(
        "directory_depth",
        "must be at least 1",
      ));
    }
    if !self.drift_threshold.is_finite() || self.drift_threshold < 0.0 {
      return Err(EngineError::validation(
        "drift_threshold",
        "must be a non-negative number",
      ));
    }
    self.weights().map(|_| ())
  }

  /// Hotspot weights, re-normalized to sum to 1.0.
  pub fn weights(&self) -> Result<WeightSet, EngineError> {
    WeightSet::normalized(
      self.weight_churn,
      self.weight_complexity,
      self.weight_coverage,
      self.weight_criticality,
    )
  }
}

/// Hotspot factor weights as they are applied (and reported in `meta.weights`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
  pub churn: f64,
  pub complexity: f64,
  pub coverage: f64,
  pub criticality: f64,
}

impl WeightSet {
  /// Divide every weight by the total, even when the total is already 1.0.
  pub fn normalized(
    churn: f64,
    complexity: f64,
    coverage: f64,
    criticality: f64,
  ) -> Result<Self, EngineError> {
    let raw = [
      ("weight_churn", churn),
      ("weight_complexity", complexity),
      ("weight_coverage", coverage),
      ("weight_criticality", criticality),
    ];
    for (field, w) in raw {
      if !w.is_finite() || w < 0.0 {
        return Err(EngineError::config(format!(
          "{} must be a non-negative number, got {}",
          field, w
        )));
      }
    }

    let total = churn + complexity + coverage + criticality;
    if total <= 0.0 {
      return Err(EngineError::config(
        "hotspot weights are all zero; at least one must be positive",
      ));
    }

    Ok(Self {
      churn: churn / total,
      complexity: complexity / total,
      coverage: coverage / total,
      criticality: criticality / total,
    })
  }

  pub fn sum(&self) -> f64 {
    self.churn + self.complexity + self.coverage + self.criticality
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    assert!(Config::default().validate().is_ok());
  }

  #[test]
  fn weights_renormalize_to_one() {
    let w = WeightSet::normalized(2.0, 2.0, 0.5, 0.5).unwrap();
    assert!((w.sum() - 1.0).abs() < 1e-12);
    assert!((w.churn - 0.4).abs() < 1e-12);
    assert!((w.coverage - 0.1).abs() < 1e-12);
  }

  #[test]
  fn single_positive_weight_takes_everything() {
    let w = WeightSet::normalized(0.0, 0.0, 3.0, 0.0).unwrap();
    assert!((w.coverage - 1.0).abs() < 1e-12);
    assert_eq!(w.churn, 0.0);
  }

  #[test]
  fn all_zero_weights_is_config_error() {
    let err = WeightSet::normalized(0.0, 0.0, 0.0, 0.0).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
  }

  #[test]
  fn negative_weight_is_config_error() {
    let err = WeightSet::normalized(-1.0, 1.0, 1.0, 1.0).unwrap_err();
    assert!(err.to_string().contains("weight_churn"));
  }

  #[test]
  fn nan_weight_is_config_error() {
    assert!(WeightSet::normalized(f64::NAN, 1.0, 0.0, 0.0).is_err());
  }

  #[test]
  fn zero_depth_rejected() {
    let config = Config {
      directory_depth: 0,
      ..Config::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("directory_depth"));
  }

  #[test]
  fn out_of_range_threshold_rejected() {
    let config = Config {
      concentration_threshold: 1.5,
      ..Config::default()
    };
    assert!(config.validate().is_err());
  }
}
