//! Core types for the risk register (JSON contracts between stages).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{GraphMode, WeightSet};
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Hotspot ranking
// ---------------------------------------------------------------------------

/// One function/block entry of a complexity report (radon-style). Extra keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplexityBlock {
  #[serde(default)]
  pub complexity: f64,
}

/// Precomputed per-file metrics. Key order is the encounter order used for tie-breaks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HotspotInputs {
  #[serde(default)]
  pub churn: IndexMap<String, u64>,
  #[serde(default)]
  pub complexity: IndexMap<String, Vec<ComplexityBlock>>,
  /// Coverage fraction per file; missing files default to 0.5.
  #[serde(default)]
  pub coverage: IndexMap<String, f64>,
  /// Criticality tier per file; missing files default to 1.
  #[serde(default)]
  pub criticality: IndexMap<String, f64>,
}

/// Weighted contribution of each factor. Sums to `risk_score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
  pub churn: f64,
  pub complexity: f64,
  pub coverage_penalty: f64,
  pub criticality_factor: f64,
}

impl ScoreComponents {
  pub fn total(&self) -> f64 {
    self.churn + self.complexity + self.coverage_penalty + self.criticality_factor
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
  pub file: String,
  pub churn: u64,
  pub avg_complexity: f64,
  pub coverage: f64,
  pub criticality: f64,
  pub risk_score: f64,
  pub components: ScoreComponents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotMeta {
  pub weights: WeightSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotReport {
  pub meta: HotspotMeta,
  pub hotspots: Vec<MetricRecord>,
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// One record of a chronological authorship stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
  Author(String),
  File(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorShare {
  pub identity: String,
  pub count: u64,
  pub pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnershipFlag {
  HighConcentration,
  SingleContributor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryOwnership {
  pub path: String,
  pub total_commits: u64,
  pub authors: Vec<AuthorShare>,
  pub top_concentration: f64,
  pub criticality: f64,
  pub flag: Option<OwnershipFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipSummary {
  pub directories_analyzed: usize,
  pub time_window_days: u32,
  pub high_concentration_count: usize,
  pub single_contributor_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipReport {
  pub summary: OwnershipSummary,
  pub directories: Vec<DirectoryOwnership>,
}

// ---------------------------------------------------------------------------
// Graph drift
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub group: Option<String>,
}

/// A dependency/call edge. Identity is the full (from, to, type) triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
  pub from: String,
  pub to: String,
  #[serde(rename = "type", default)]
  pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMeta {
  #[serde(rename = "ref", default)]
  pub reference: Option<String>,
  #[serde(default)]
  pub generated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
  #[serde(default)]
  pub nodes: Vec<GraphNode>,
  #[serde(default)]
  pub edges: Vec<GraphEdge>,
  #[serde(default)]
  pub meta: GraphMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftSummary {
  #[serde(default)]
  pub previous_ref: Option<String>,
  #[serde(default)]
  pub current_ref: Option<String>,
  #[serde(default)]
  pub mode: GraphMode,
  pub added_nodes_count: usize,
  pub removed_nodes_count: usize,
  pub added_edges_count: usize,
  pub removed_edges_count: usize,
  pub churn_ratio: f64,
  pub threshold: f64,
  pub breach: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
  pub summary: DriftSummary,
  pub added_nodes: Vec<String>,
  pub removed_nodes: Vec<String>,
  pub added_edges: Vec<GraphEdge>,
  pub removed_edges: Vec<GraphEdge>,
  pub core_boundary_flags: Vec<GraphEdge>,
  /// blake3 digest of the canonical summary JSON.
  #[serde(default)]
  pub hash: String,
}

/// Terminal condition of a drift run. Both arms carry the full report.
#[derive(Debug, Clone, PartialEq)]
pub enum DriftOutcome {
  WithinTolerance(DriftReport),
  Breach(DriftReport),
}

impl DriftOutcome {
  pub fn is_breach(&self) -> bool {
    matches!(self, Self::Breach(_))
  }

  pub fn report(&self) -> &DriftReport {
    match self {
      Self::WithinTolerance(r) | Self::Breach(r) => r,
    }
  }

  pub fn into_report(self) -> DriftReport {
    match self {
      Self::WithinTolerance(r) | Self::Breach(r) => r,
    }
  }
}

// ---------------------------------------------------------------------------
// Severity + findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
  Low,
  #[default]
  Medium,
  High,
  Critical,
}

fn unset_finding_id() -> String {
  "SEC-UNSET".to_string()
}

/// Normalized security/static-analysis finding, whatever scanner produced it.
///
/// Scanner-specific keys (cve, package, check_id, ...) live in `extra` and are
/// written back out flat next to the common ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
  #[serde(default = "unset_finding_id")]
  pub id: String,
  #[serde(default)]
  pub severity: Severity,
  #[serde(default)]
  pub component: String,
  #[serde(default)]
  pub desc: String,
  #[serde(default)]
  pub recommendation: String,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Consolidated register (output contract)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskType {
  Hotspot,
  ArchDrift,
  BoundaryViolation,
  KnowledgeConcentration,
  Security,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskItem {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: RiskType,
  pub severity: Severity,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub component: Option<String>,
  /// The source record this item was derived from, unchanged.
  pub details: Value,
  pub recommendation: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sources {
  pub hotspots: bool,
  pub drift: bool,
  pub ownership: bool,
  pub security: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRegister {
  pub timestamp: String,
  pub sources: Sources,
  pub derived_risks: Vec<RiskItem>,
}

/// Whichever stage documents are available for consolidation.
///
/// Documents are kept as parsed JSON so each record can be echoed into
/// `details` exactly as it was read, including keys no stage here knows about.
#[derive(Debug, Clone, Default)]
pub struct ConsolidationInputs {
  /// `{"hotspots": [MetricRecord, ...]}`
  pub hotspots: Option<Value>,
  /// `{"summary": {...}, "core_boundary_flags": [...], "hash": "..."}`
  pub drift: Option<Value>,
  /// `{"directories": [DirectoryOwnership, ...]}`
  pub ownership: Option<Value>,
  /// `[Finding, ...]`
  pub security: Option<Value>,
}

impl ConsolidationInputs {
  pub fn with_hotspots(mut self, report: &HotspotReport) -> Result<Self, EngineError> {
    self.hotspots = Some(serde_json::to_value(report)?);
    Ok(self)
  }

  pub fn with_drift(mut self, report: &DriftReport) -> Result<Self, EngineError> {
    self.drift = Some(serde_json::to_value(report)?);
    Ok(self)
  }

  pub fn with_ownership(mut self, report: &OwnershipReport) -> Result<Self, EngineError> {
    self.ownership = Some(serde_json::to_value(report)?);
    Ok(self)
  }

  pub fn with_security(mut self, findings: &[Finding]) -> Result<Self, EngineError> {
    self.security = Some(serde_json::to_value(findings)?);
    Ok(self)
  }
}
