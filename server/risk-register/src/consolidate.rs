//! Merge stage reports into one typed risk register.
//!
//! Items are emitted per source in a fixed order (hotspots, drift breach,
//! boundary flags, ownership, security) and never re-sorted by severity.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::EngineError;
use crate::fingerprint::IdAllocator;
use crate::types::*;

const HOTSPOT_HIGH: f64 = 0.75;
const HOTSPOT_MEDIUM: f64 = 0.5;
const DRIFT_HIGH_CHURN: f64 = 0.3;
const SINGLE_CONTRIBUTOR_HIGH_CRITICALITY: f64 = 3.0;
const HIGH_CONCENTRATION_HIGH_CRITICALITY: f64 = 4.0;

const HOTSPOT_RECOMMENDATION: &str =
  "Refactor / add tests / reduce complexity; prioritize if part of production path.";
const DRIFT_RECOMMENDATION: &str =
  "Initiate architecture review; validate new edges for boundary violations.";
const BOUNDARY_RECOMMENDATION: &str =
  "Assess if new dependency is intentional; consider facade or inversion.";
const OWNERSHIP_RECOMMENDATION: &str =
  "Spread knowledge via pairing, docs, secondary owner assignment.";
const SECURITY_FALLBACK_RECOMMENDATION: &str = "Review & patch.";

pub fn hotspot_severity(risk_score: f64) -> Severity {
  if risk_score >= HOTSPOT_HIGH {
    Severity::High
  } else if risk_score >= HOTSPOT_MEDIUM {
    Severity::Medium
  } else {
    Severity::Low
  }
}

pub fn drift_severity(churn_ratio: f64) -> Severity {
  if churn_ratio >= DRIFT_HIGH_CHURN {
    Severity::High
  } else {
    Severity::Medium
  }
}

pub fn ownership_severity(flag: OwnershipFlag, criticality: f64) -> Severity {
  match flag {
    OwnershipFlag::SingleContributor if criticality >= SINGLE_CONTRIBUTOR_HIGH_CRITICALITY => {
      Severity::High
    }
    OwnershipFlag::HighConcentration if criticality >= HIGH_CONCENTRATION_HIGH_CRITICALITY => {
      Severity::High
    }
    _ => Severity::Medium,
  }
}

// ---------------------------------------------------------------------------
// Record views: only the fields severity and ids depend on
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HotspotRow {
  file: String,
  risk_score: f64,
}

#[derive(Debug, Deserialize)]
struct DriftSummaryRow {
  #[serde(default)]
  current_ref: Option<String>,
  churn_ratio: f64,
  breach: bool,
}

fn default_criticality() -> f64 {
  1.0
}

#[derive(Debug, Deserialize)]
struct DirectoryRow {
  path: String,
  #[serde(default)]
  flag: Option<OwnershipFlag>,
  #[serde(default = "default_criticality")]
  criticality: f64,
}

/// Build the register for `now`. Absent inputs contribute nothing and are
/// recorded as `false` in `sources`. Every item's `details` is the source
/// record exactly as supplied.
pub fn consolidate(
  inputs: &ConsolidationInputs,
  now: DateTime<Utc>,
) -> Result<RiskRegister, EngineError> {
  let mut ids = IdAllocator::new();
  let mut derived: Vec<RiskItem> = Vec::new();

  if let Some(doc) = &inputs.hotspots {
    for raw in records(doc.get("hotspots"), "hotspots.hotspots")? {
      let h: HotspotRow = view(raw, "hotspots.hotspots[]")?;
      derived.push(RiskItem {
        id: ids.allocate(format!("RISK-HOTSPOT-{}", h.file)),
        kind: RiskType::Hotspot,
        severity: hotspot_severity(h.risk_score),
        component: Some(h.file),
        details: raw.clone(),
        recommendation: HOTSPOT_RECOMMENDATION.to_string(),
      });
    }
  }

  if let Some(doc) = &inputs.drift {
    let raw_summary = doc
      .get("summary")
      .ok_or_else(|| EngineError::parse("drift: missing summary"))?;
    let s: DriftSummaryRow = view(raw_summary, "drift.summary")?;
    if s.breach {
      let subject = match s.current_ref {
        Some(r) if !r.is_empty() => r,
        _ => doc
          .get("hash")
          .and_then(Value::as_str)
          .unwrap_or_default()
          .chars()
          .take(12)
          .collect(),
      };
      derived.push(RiskItem {
        id: ids.allocate(format!("RISK-DRIFT-{}", subject)),
        kind: RiskType::ArchDrift,
        severity: drift_severity(s.churn_ratio),
        component: None,
        details: raw_summary.clone(),
        recommendation: DRIFT_RECOMMENDATION.to_string(),
      });
    }
    for raw in records(doc.get("core_boundary_flags"), "drift.core_boundary_flags")? {
      let edge: GraphEdge = view(raw, "drift.core_boundary_flags[]")?;
      let mut base = format!("RISK-BOUNDARY-{}->{}", edge.from, edge.to);
      if !edge.kind.is_empty() {
        base.push(':');
        base.push_str(&edge.kind);
      }
      derived.push(RiskItem {
        id: ids.allocate(base),
        kind: RiskType::BoundaryViolation,
        severity: Severity::Medium,
        component: Some(edge.to),
        details: raw.clone(),
        recommendation: BOUNDARY_RECOMMENDATION.to_string(),
      });
    }
  }

  if let Some(doc) = &inputs.ownership {
    for raw in records(doc.get("directories"), "ownership.directories")? {
      let dir: DirectoryRow = view(raw, "ownership.directories[]")?;
      let Some(flag) = dir.flag else {
        continue;
      };
      derived.push(RiskItem {
        id: ids.allocate(format!("RISK-OWN-{}", dir.path)),
        kind: RiskType::KnowledgeConcentration,
        severity: ownership_severity(flag, dir.criticality),
        component: Some(dir.path),
        details: raw.clone(),
        recommendation: OWNERSHIP_RECOMMENDATION.to_string(),
      });
    }
  }

  if let Some(doc) = &inputs.security {
    for raw in records(Some(doc), "security")? {
      let finding: Finding = view(raw, "security[]")?;
      let recommendation = security_recommendation(&finding);
      derived.push(RiskItem {
        id: ids.allocate(finding.id),
        kind: RiskType::Security,
        severity: finding.severity,
        component: Some(finding.component).filter(|c| !c.is_empty()),
        details: raw.clone(),
        recommendation,
      });
    }
  }

  let sources = Sources {
    hotspots: inputs.hotspots.is_some(),
    drift: inputs.drift.is_some(),
    ownership: inputs.ownership.is_some(),
    security: inputs.security.is_some(),
  };
  info!(
    risks = derived.len(),
    hotspots = sources.hotspots,
    drift = sources.drift,
    ownership = sources.ownership,
    security = sources.security,
    "consolidated risk register"
  );

  Ok(RiskRegister {
    timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
    sources,
    derived_risks: derived,
  })
}

/// `recommendation`, else a hand-written `remediation`, else the generic advice.
fn security_recommendation(finding: &Finding) -> String {
  if !finding.recommendation.is_empty() {
    return finding.recommendation.clone();
  }
  match finding.extra.get("remediation").and_then(Value::as_str) {
    Some(r) if !r.is_empty() => r.to_string(),
    _ => SECURITY_FALLBACK_RECOMMENDATION.to_string(),
  }
}

/// A missing or null list has no records; anything else must be a JSON array.
fn records<'a>(list: Option<&'a Value>, field: &str) -> Result<&'a [Value], EngineError> {
  match list {
    None | Some(Value::Null) => Ok(&[]),
    Some(Value::Array(items)) => Ok(items),
    Some(_) => Err(EngineError::parse(format!("{}: expected a list", field))),
  }
}

fn view<T: DeserializeOwned>(raw: &Value, field: &str) -> Result<T, EngineError> {
  T::deserialize(raw).map_err(|e| EngineError::parse(format!("{}: {}", field, e)))
}
