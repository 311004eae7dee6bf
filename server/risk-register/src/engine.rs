//! Core engine: one validated configuration threaded through every stage.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::config::Config;
use crate::consolidate;
use crate::drift;
use crate::error::EngineError;
use crate::findings::Scanner;
use crate::hotspot;
use crate::ownership;
use crate::types::*;

/// The risk pipeline. Holds no state between calls besides its configuration;
/// every stage is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct Engine {
  config: Config,
}

impl Engine {
  /// Validate `config` once; stages can then rely on its ranges.
  pub fn new(config: Config) -> Result<Self, EngineError> {
    config.validate()?;
    Ok(Self { config })
  }

  pub fn with_defaults() -> Self {
    Self {
      config: Config::default(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn rank_hotspots(&self, inputs: &HotspotInputs) -> Result<HotspotReport, EngineError> {
    let weights = self.config.weights()?;
    hotspot::rank(inputs, &weights, self.config.top_n)
  }

  pub fn analyze_ownership(
    &self,
    entries: &[LogEntry],
    criticality: &IndexMap<String, f64>,
  ) -> OwnershipReport {
    ownership::analyze(entries, criticality, &self.config)
  }

  /// Returns `Ok(DriftOutcome::Breach(_))` when the churn ratio reaches the threshold.
  pub fn detect_drift(
    &self,
    previous: &GraphSnapshot,
    current: &GraphSnapshot,
  ) -> Result<DriftOutcome, EngineError> {
    drift::detect(
      previous,
      current,
      self.config.drift_threshold,
      self.config.graph_mode,
    )
  }

  pub fn normalize_findings(&self, scanner: Scanner, raw: &str) -> Vec<Finding> {
    scanner.normalize(raw)
  }

  /// Consolidate with the current wall-clock time as the register timestamp.
  pub fn consolidate(&self, inputs: &ConsolidationInputs) -> Result<RiskRegister, EngineError> {
    self.consolidate_at(inputs, Utc::now())
  }

  pub fn consolidate_at(
    &self,
    inputs: &ConsolidationInputs,
    now: DateTime<Utc>,
  ) -> Result<RiskRegister, EngineError> {
    consolidate::consolidate(inputs, now)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::GraphMode;

  fn inputs() -> HotspotInputs {
    serde_json::from_str(
      r#"{
        "churn": {"a.py": 10, "b.py": 5},
        "complexity": {"a.py": [{"complexity": 8}], "b.py": [{"complexity": 2}]}
      }"#,
    )
    .unwrap()
  }

  #[test]
  fn invalid_config_is_rejected_up_front() {
    let err = Engine::new(Config {
      weight_churn: 0.0,
      weight_complexity: 0.0,
      weight_coverage: 0.0,
      weight_criticality: 0.0,
      ..Config::default()
    })
    .unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
  }

  #[test]
  fn weights_are_taken_from_config() {
    let engine = Engine::new(Config {
      weight_churn: 1.0,
      weight_complexity: 0.0,
      weight_coverage: 0.0,
      weight_criticality: 0.0,
      ..Config::default()
    })
    .unwrap();
    let report = engine.rank_hotspots(&inputs()).unwrap();
    assert_eq!(report.hotspots[0].risk_score, 1.0);
    assert_eq!(report.hotspots[1].risk_score, 0.5);
  }

  #[test]
  fn top_n_is_taken_from_config() {
    let engine = Engine::new(Config {
      top_n: 1,
      ..Config::default()
    })
    .unwrap();
    assert_eq!(engine.rank_hotspots(&inputs()).unwrap().hotspots.len(), 1);
  }

  #[test]
  fn drift_threshold_and_mode_are_taken_from_config() {
    let engine = Engine::new(Config {
      drift_threshold: 2.0,
      graph_mode: GraphMode::Services,
      ..Config::default()
    })
    .unwrap();
    let previous = GraphSnapshot::default();
    let current: GraphSnapshot =
      serde_json::from_str(r#"{"nodes":[{"id":"a"},{"id":"b"}],"edges":[{"from":"a","to":"b"}]}"#)
        .unwrap();
    let outcome = engine.detect_drift(&previous, &current).unwrap();
    assert!(!outcome.is_breach());
    assert_eq!(outcome.report().summary.threshold, 2.0);
    assert_eq!(outcome.report().summary.mode, GraphMode::Services);
  }

  #[test]
  fn findings_go_through_the_engine() {
    let engine = Engine::with_defaults();
    let raw = r#"{"results":[{"check_id":"r1","path":"a.py","extra":{"severity":"ERROR"}}]}"#;
    let findings = engine.normalize_findings(Scanner::Semgrep, raw);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].severity, Severity::High);
    assert!(engine.normalize_findings(Scanner::Trivy, "").is_empty());
  }

  #[test]
  fn register_ids_are_stable_across_runs() {
    let engine = Engine::with_defaults();
    let consolidation = ConsolidationInputs::default()
      .with_hotspots(&engine.rank_hotspots(&inputs()).unwrap())
      .unwrap();
    let r1 = engine.consolidate(&consolidation).unwrap();
    let r2 = engine.consolidate(&consolidation).unwrap();
    let ids1: Vec<_> = r1.derived_risks.iter().map(|r| r.id.clone()).collect();
    let ids2: Vec<_> = r2.derived_risks.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids1, ids2);
  }
}
