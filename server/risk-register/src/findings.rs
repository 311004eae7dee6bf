//! Normalize scanner output into the common Finding shape.
//!
//! Each supported scanner is one [`Scanner`] variant with its own adapter. Adapters
//! never fail: unreadable input is logged and yields no findings, so one broken
//! scanner report cannot stop consolidation.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::types::{Finding, Severity};

const MAX_DESC_CHARS: usize = 300;

const SEMGREP_RECOMMENDATION: &str =
  "Review Semgrep rule guidance; apply fix or suppress with justification.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scanner {
  Trivy,
  Semgrep,
}

impl Scanner {
  pub fn name(self) -> &'static str {
    match self {
      Self::Trivy => "trivy",
      Self::Semgrep => "semgrep",
    }
  }

  /// Parse raw scanner JSON into findings. Malformed input yields an empty list.
  pub fn normalize(self, raw: &str) -> Vec<Finding> {
    let findings = match self {
      Self::Trivy => serde_json::from_str::<TrivyDocument>(raw).map(trivy_findings),
      Self::Semgrep => serde_json::from_str::<SemgrepReport>(raw).map(semgrep_findings),
    };
    match findings {
      Ok(findings) => {
        info!(scanner = self.name(), count = findings.len(), "normalized findings");
        findings
      }
      Err(e) => {
        warn!(scanner = self.name(), error = %e, "could not parse scanner output; emitting no findings");
        Vec::new()
      }
    }
  }
}

// ---------------------------------------------------------------------------
// Trivy
// ---------------------------------------------------------------------------

/// Trivy emits either one report object or a list of them (one per target).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrivyDocument {
  One(TrivyReport),
  Many(Vec<TrivyReport>),
}

#[derive(Debug, Default, Deserialize)]
struct TrivyReport {
  #[serde(rename = "Results", default)]
  results: Vec<TrivyResult>,
}

#[derive(Debug, Deserialize)]
struct TrivyResult {
  #[serde(rename = "Target", default)]
  target: Option<String>,
  #[serde(rename = "Vulnerabilities", default)]
  vulnerabilities: Option<Vec<TrivyVulnerability>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrivyVulnerability {
  #[serde(rename = "VulnerabilityID", default)]
  vulnerability_id: Option<String>,
  #[serde(default)]
  pkg_name: Option<String>,
  #[serde(default)]
  installed_version: Option<String>,
  #[serde(default)]
  fixed_version: Option<String>,
  #[serde(default)]
  severity: Option<String>,
  #[serde(default)]
  title: Option<String>,
  #[serde(default)]
  description: Option<String>,
}

/// CRITICAL folds into HIGH; unknown levels are treated as LOW.
fn trivy_severity(raw: Option<&str>) -> Severity {
  match raw.unwrap_or("UNKNOWN").to_ascii_uppercase().as_str() {
    "CRITICAL" | "HIGH" => Severity::High,
    "MEDIUM" => Severity::Medium,
    _ => Severity::Low,
  }
}

fn trivy_findings(doc: TrivyDocument) -> Vec<Finding> {
  let reports = match doc {
    TrivyDocument::One(r) => vec![r],
    TrivyDocument::Many(rs) => rs,
  };

  let mut out = Vec::new();
  for result in reports.into_iter().flat_map(|r| r.results) {
    let target = result.target.unwrap_or_else(|| "UNKNOWN_TARGET".to_string());
    for vuln in result.vulnerabilities.unwrap_or_default() {
      let cve = vuln.vulnerability_id.unwrap_or_default();
      let package = vuln.pkg_name.unwrap_or_else(|| "unknown".to_string());
      let installed = vuln.installed_version.unwrap_or_else(|| "?".to_string());
      let fixed = vuln.fixed_version.filter(|f| !f.is_empty());
      let summary = vuln
        .title
        .filter(|t| !t.is_empty())
        .or(vuln.description)
        .unwrap_or_default();
      let recommendation = match &fixed {
        Some(f) => format!("Upgrade to {}", f),
        None => "Monitor upstream; no fixed version.".to_string(),
      };

      let mut extra = Map::new();
      extra.insert("cve".into(), Value::String(cve.clone()));
      extra.insert("package".into(), Value::String(package.clone()));
      extra.insert("installed_version".into(), Value::String(installed.clone()));
      extra.insert(
        "fixed_version".into(),
        fixed.map_or(Value::Null, Value::String),
      );

      out.push(Finding {
        id: format!("SEC-TRIVY-{}", cve),
        severity: trivy_severity(vuln.severity.as_deref()),
        component: format!("{}::{}@{}", target, package, installed),
        desc: truncate(&summary, MAX_DESC_CHARS),
        recommendation,
        extra,
      });
    }
  }
  out
}

// ---------------------------------------------------------------------------
// Semgrep
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SemgrepReport {
  #[serde(default)]
  results: Vec<SemgrepResult>,
}

#[derive(Debug, Deserialize)]
struct SemgrepResult {
  #[serde(default)]
  check_id: Option<String>,
  #[serde(default)]
  path: Option<String>,
  #[serde(default)]
  extra: SemgrepExtra,
  #[serde(default)]
  start: Option<SemgrepPosition>,
}

#[derive(Debug, Default, Deserialize)]
struct SemgrepExtra {
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SemgrepPosition {
  #[serde(default)]
  line: Option<u64>,
}

fn semgrep_severity(raw: Option<&str>) -> Severity {
  match raw.unwrap_or("INFO").to_ascii_uppercase().as_str() {
    "ERROR" => Severity::High,
    "WARNING" => Severity::Medium,
    _ => Severity::Low,
  }
}

fn semgrep_findings(report: SemgrepReport) -> Vec<Finding> {
  report
    .results
    .into_iter()
    .map(|r| {
      let check_id = r.check_id.unwrap_or_else(|| "UNKNOWN".to_string());
      let message = r.extra.message.unwrap_or_default();
      let line = r.start.and_then(|s| s.line);
      let desc = match line {
        Some(n) => format!("{} (line {})", message, n),
        None => message,
      };

      let mut extra = Map::new();
      extra.insert("check_id".into(), Value::String(check_id.clone()));
      extra.insert("line".into(), line.map_or(Value::Null, Value::from));

      Finding {
        id: format!("SEC-SEMGREP-{}", check_id),
        severity: semgrep_severity(r.extra.severity.as_deref()),
        component: r.path.unwrap_or_else(|| "UNKNOWN".to_string()),
        desc: truncate(&desc, MAX_DESC_CHARS),
        recommendation: SEMGREP_RECOMMENDATION.to_string(),
        extra,
      }
    })
    .collect()
}

fn truncate(s: &str, max_chars: usize) -> String {
  s.chars().take(max_chars).collect()
}
