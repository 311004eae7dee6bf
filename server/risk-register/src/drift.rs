//! Architecture drift between two dependency/service graph snapshots.
//!
//! Nodes diff on id, edges on the full (from, to, type) triple. A new edge into
//! a node that existed before with no incoming edges is reported as a likely
//! boundary violation: nothing depended on that node, now something does.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{info, warn};

use crate::config::GraphMode;
use crate::error::EngineError;
use crate::fingerprint;
use crate::hotspot::round_to;
use crate::types::{DriftOutcome, DriftReport, DriftSummary, GraphEdge, GraphSnapshot};

/// Diff `previous` against `current` and classify the result against `threshold`.
///
/// Breach is returned as [`DriftOutcome::Breach`], not as an error.
pub fn detect(
  previous: &GraphSnapshot,
  current: &GraphSnapshot,
  threshold: f64,
  mode: GraphMode,
) -> Result<DriftOutcome, EngineError> {
  if !threshold.is_finite() || threshold < 0.0 {
    return Err(EngineError::validation(
      "threshold",
      "must be a non-negative number",
    ));
  }
  let prev_ids = node_ids(previous, "previous.nodes")?;
  let cur_ids = node_ids(current, "current.nodes")?;

  let added_nodes: Vec<String> = cur_ids.difference(&prev_ids).map(|s| s.to_string()).collect();
  let removed_nodes: Vec<String> = prev_ids.difference(&cur_ids).map(|s| s.to_string()).collect();

  let prev_edges: BTreeSet<&GraphEdge> = previous.edges.iter().collect();
  let cur_edges: BTreeSet<&GraphEdge> = current.edges.iter().collect();

  let added_edges: Vec<GraphEdge> = cur_edges.difference(&prev_edges).map(|e| (*e).clone()).collect();
  let removed_edges: Vec<GraphEdge> = prev_edges.difference(&cur_edges).map(|e| (*e).clone()).collect();

  let churn_ratio =
    (added_edges.len() + removed_edges.len()) as f64 / prev_edges.len().max(1) as f64;
  let breach = churn_ratio >= threshold;

  let core_boundary_flags = boundary_violations(&prev_edges, &prev_ids, &added_edges);

  let summary = DriftSummary {
    previous_ref: previous.meta.reference.clone(),
    current_ref: current.meta.reference.clone(),
    mode,
    added_nodes_count: added_nodes.len(),
    removed_nodes_count: removed_nodes.len(),
    added_edges_count: added_edges.len(),
    removed_edges_count: removed_edges.len(),
    churn_ratio: round_to(churn_ratio, 4),
    threshold,
    breach,
  };
  let hash = fingerprint::summary_hash(&summary)?;

  let report = DriftReport {
    summary,
    added_nodes,
    removed_nodes,
    added_edges,
    removed_edges,
    core_boundary_flags,
    hash,
  };

  if breach {
    warn!(
      churn_ratio = report.summary.churn_ratio,
      threshold,
      boundary_flags = report.core_boundary_flags.len(),
      "drift threshold exceeded"
    );
    Ok(DriftOutcome::Breach(report))
  } else {
    info!(
      churn_ratio = report.summary.churn_ratio,
      threshold,
      boundary_flags = report.core_boundary_flags.len(),
      "drift within tolerance"
    );
    Ok(DriftOutcome::WithinTolerance(report))
  }
}

/// Added edges whose target existed previously with in-degree 0.
fn boundary_violations(
  prev_edges: &BTreeSet<&GraphEdge>,
  prev_ids: &BTreeSet<&str>,
  added_edges: &[GraphEdge],
) -> Vec<GraphEdge> {
  let mut in_degree: HashMap<&str, usize> = HashMap::new();
  for edge in prev_edges {
    *in_degree.entry(edge.to.as_str()).or_insert(0) += 1;
  }

  added_edges
    .iter()
    .filter(|e| {
      prev_ids.contains(e.to.as_str()) && in_degree.get(e.to.as_str()).copied().unwrap_or(0) == 0
    })
    .cloned()
    .collect()
}

/// Sorted node ids; a duplicate id within one snapshot is malformed input.
fn node_ids<'a>(graph: &'a GraphSnapshot, field: &str) -> Result<BTreeSet<&'a str>, EngineError> {
  let mut seen = HashSet::with_capacity(graph.nodes.len());
  for node in &graph.nodes {
    if !seen.insert(node.id.as_str()) {
      return Err(EngineError::validation(
        field,
        &format!("duplicate node id {:?}", node.id),
      ));
    }
  }
  Ok(seen.into_iter().collect())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{GraphMeta, GraphNode};

  fn node(id: &str) -> GraphNode {
    GraphNode {
      id: id.into(),
      group: None,
    }
  }

  fn edge(from: &str, to: &str, kind: &str) -> GraphEdge {
    GraphEdge {
      from: from.into(),
      to: to.into(),
      kind: kind.into(),
    }
  }

  fn graph(nodes: &[&str], edges: Vec<GraphEdge>) -> GraphSnapshot {
    GraphSnapshot {
      nodes: nodes.iter().map(|n| node(n)).collect(),
      edges,
      meta: GraphMeta::default(),
    }
  }

  fn base() -> GraphSnapshot {
    graph(
      &["api", "core", "db", "util"],
      vec![edge("api", "core", "import"), edge("core", "db", "import")],
    )
  }

  #[test]
  fn identical_graphs_have_no_drift() {
    let outcome = detect(&base(), &base(), 0.1, GraphMode::Deps).unwrap();
    assert!(!outcome.is_breach());
    let r = outcome.report();
    assert!(r.added_nodes.is_empty());
    assert!(r.removed_nodes.is_empty());
    assert!(r.added_edges.is_empty());
    assert!(r.removed_edges.is_empty());
    assert_eq!(r.summary.churn_ratio, 0.0);
    assert!(!r.summary.breach);
  }

  #[test]
  fn edge_into_unreferenced_existing_node_is_boundary_violation() {
    let mut current = base();
    current.edges.push(edge("api", "util", "import"));
    let outcome = detect(&base(), &current, 0.1, GraphMode::Deps).unwrap();
    let r = outcome.report();
    assert_eq!(r.core_boundary_flags, vec![edge("api", "util", "import")]);
    // 1 added / 2 previous edges.
    assert_eq!(r.summary.churn_ratio, 0.5);
    assert!(outcome.is_breach());
  }

  #[test]
  fn edge_into_new_node_is_not_boundary_violation() {
    let mut current = base();
    current.nodes.push(node("cache"));
    current.edges.push(edge("api", "cache", "import"));
    let r = detect(&base(), &current, 0.1, GraphMode::Deps).unwrap().into_report();
    assert_eq!(r.added_nodes, vec!["cache".to_string()]);
    assert!(r.core_boundary_flags.is_empty());
  }

  #[test]
  fn edge_into_already_referenced_node_is_not_flagged() {
    let mut current = base();
    current.edges.push(edge("util", "db", "import"));
    let r = detect(&base(), &current, 0.1, GraphMode::Deps).unwrap().into_report();
    assert!(r.core_boundary_flags.is_empty());
  }

  #[test]
  fn edge_type_is_part_of_identity() {
    let mut current = base();
    current.edges.push(edge("api", "core", "call"));
    let r = detect(&base(), &current, 0.1, GraphMode::Deps).unwrap().into_report();
    assert_eq!(r.added_edges, vec![edge("api", "core", "call")]);
    assert!(r.removed_edges.is_empty());
  }

  #[test]
  fn removed_nodes_and_edges_are_reported_sorted() {
    let current = graph(&["api"], vec![]);
    let r = detect(&base(), &current, 0.1, GraphMode::Deps).unwrap().into_report();
    assert_eq!(r.removed_nodes, vec!["core", "db", "util"]);
    assert_eq!(
      r.removed_edges,
      vec![edge("api", "core", "import"), edge("core", "db", "import")]
    );
    assert_eq!(r.summary.churn_ratio, 1.0);
  }

  #[test]
  fn empty_previous_graph_divides_by_one() {
    let previous = graph(&[], vec![]);
    let current = graph(&["a", "b"], vec![edge("a", "b", "")]);
    let r = detect(&previous, &current, 0.1, GraphMode::Services).unwrap().into_report();
    assert_eq!(r.summary.churn_ratio, 1.0);
    assert_eq!(r.summary.mode, GraphMode::Services);
    assert!(r.core_boundary_flags.is_empty());
  }

  #[test]
  fn below_threshold_is_within_tolerance() {
    let previous = graph(
      &["a", "b"],
      (0..20).map(|i| edge("a", "b", &format!("t{}", i))).collect(),
    );
    let mut current = previous.clone();
    current.edges.push(edge("b", "a", "import"));
    let outcome = detect(&previous, &current, 0.1, GraphMode::Deps).unwrap();
    assert!(!outcome.is_breach());
    assert_eq!(outcome.report().summary.churn_ratio, 0.05);
  }

  #[test]
  fn ratio_equal_to_threshold_breaches() {
    let mut current = base();
    current.edges.push(edge("db", "api", "import"));
    let outcome = detect(&base(), &current, 0.5, GraphMode::Deps).unwrap();
    assert!(outcome.is_breach());
  }

  #[test]
  fn hash_is_stable_across_runs_and_input_order() {
    let mut current = base();
    current.edges.push(edge("api", "util", "import"));
    let mut shuffled = current.clone();
    shuffled.edges.reverse();
    shuffled.nodes.reverse();

    let h1 = detect(&base(), &current, 0.1, GraphMode::Deps).unwrap().into_report().hash;
    let h2 = detect(&base(), &current, 0.1, GraphMode::Deps).unwrap().into_report().hash;
    let h3 = detect(&base(), &shuffled, 0.1, GraphMode::Deps).unwrap().into_report().hash;
    assert_eq!(h1, h2);
    assert_eq!(h1, h3);
  }

  #[test]
  fn refs_are_echoed_in_summary() {
    let mut previous = base();
    previous.meta.reference = Some("v1".into());
    let mut current = base();
    current.meta.reference = Some("v2".into());
    let r = detect(&previous, &current, 0.1, GraphMode::Deps).unwrap().into_report();
    assert_eq!(r.summary.previous_ref.as_deref(), Some("v1"));
    assert_eq!(r.summary.current_ref.as_deref(), Some("v2"));
  }

  #[test]
  fn duplicate_node_id_is_rejected() {
    let current = graph(&["a", "a"], vec![]);
    let err = detect(&base(), &current, 0.1, GraphMode::Deps).unwrap_err();
    assert!(err.to_string().contains("current.nodes"));
  }

  #[test]
  fn negative_threshold_is_rejected() {
    assert!(detect(&base(), &base(), -0.1, GraphMode::Deps).is_err());
  }
}
