//! Loaders for raw pipeline artifacts and the JSON writer used by the binary.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::EngineError;
use crate::types::ComplexityBlock;

pub fn read_text(path: &Path) -> Result<String, EngineError> {
  fs::read_to_string(path).map_err(|e| EngineError::io(path, e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, EngineError> {
  let text = read_text(path)?;
  serde_json::from_str(&text)
    .map_err(|e| EngineError::parse(format!("{}: {}", path.display(), e)))
}

/// Load a report only if a path was given.
pub fn read_optional_json<T: DeserializeOwned>(path: Option<&Path>) -> Result<Option<T>, EngineError> {
  path.map(read_json::<T>).transpose()
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), EngineError> {
  let mut json = serde_json::to_string_pretty(value)?;
  json.push('\n');
  fs::write(path, json).map_err(|e| EngineError::io(path, e))?;
  debug!(path = %path.display(), "wrote report");
  Ok(())
}

/// Parse `git log | sort | uniq -c` style churn: `<count> <path>` per line.
pub fn parse_churn(text: &str) -> Result<IndexMap<String, u64>, EngineError> {
  let mut churn = IndexMap::new();
  for (idx, line) in text.lines().enumerate() {
    let mut parts = line.split_whitespace();
    let (Some(count), Some(file)) = (parts.next(), parts.next()) else {
      continue;
    };
    let count: u64 = count
      .parse()
      .map_err(|_| EngineError::parse(format!("churn line {}: bad count {:?}", idx + 1, count)))?;
    churn.insert(file.to_string(), count);
  }
  Ok(churn)
}

/// Radon `cc -j` output or `{path: [{"complexity": n}, ...]}`. Non-list entries are skipped.
pub fn parse_complexity(text: &str) -> Result<IndexMap<String, Vec<ComplexityBlock>>, EngineError> {
  let raw: IndexMap<String, Value> = serde_json::from_str(text)?;
  let mut out = IndexMap::with_capacity(raw.len());
  for (file, blocks) in raw {
    if !blocks.is_array() {
      debug!(file = %file, "skipping non-list complexity entry");
      continue;
    }
    let blocks: Vec<ComplexityBlock> = serde_json::from_value(blocks)
      .map_err(|e| EngineError::parse(format!("complexity[{}]: {}", file, e)))?;
    out.insert(file, blocks);
  }
  Ok(out)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoverageDocument {
  Wrapped { files: IndexMap<String, f64> },
  Plain(IndexMap<String, f64>),
}

/// Coverage as `{"files": {path: fraction}}` or a bare `{path: fraction}` map.
pub fn parse_coverage(text: &str) -> Result<IndexMap<String, f64>, EngineError> {
  let doc: CoverageDocument = serde_json::from_str(text)
    .map_err(|e| EngineError::parse(format!("coverage: {}", e)))?;
  Ok(match doc {
    CoverageDocument::Wrapped { files } => files,
    CoverageDocument::Plain(files) => files,
  })
}

/// Criticality map (path -> tier) from YAML. JSON maps are valid YAML too.
pub fn parse_criticality(text: &str) -> Result<IndexMap<String, f64>, EngineError> {
  if text.trim().is_empty() {
    return Ok(IndexMap::new());
  }
  // `~` / `null` documents are an empty map too.
  let map: Option<IndexMap<String, f64>> = serde_yaml::from_str(text)
    .map_err(|e| EngineError::parse(format!("criticality: {}", e)))?;
  Ok(map.unwrap_or_default())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Sources;

  #[test]
  fn churn_lines_parse_in_order() {
    let churn = parse_churn("  12 src/b.py\n3 src/a.py\n\ngarbage\n").unwrap();
    let files: Vec<_> = churn.keys().map(String::as_str).collect();
    assert_eq!(files, vec!["src/b.py", "src/a.py"]);
    assert_eq!(churn["src/b.py"], 12);
  }

  #[test]
  fn churn_bad_count_is_parse_error() {
    let err = parse_churn("x src/a.py\n").unwrap_err();
    assert!(err.to_string().contains("churn line 1"));
  }

  #[test]
  fn complexity_skips_non_lists() {
    let text = r#"{
      "a.py": [{"type": "function", "name": "f", "complexity": 4}, {"complexity": 2}],
      "b.py": {"error": "could not parse"},
      "c.py": []
    }"#;
    let cc = parse_complexity(text).unwrap();
    assert_eq!(cc.len(), 2);
    assert_eq!(cc["a.py"].len(), 2);
    assert_eq!(cc["a.py"][0].complexity, 4.0);
    assert!(cc["c.py"].is_empty());
  }

  #[test]
  fn coverage_accepts_both_shapes() {
    let wrapped = parse_coverage(r#"{"files": {"a.py": 0.8}, "totals": {}}"#).unwrap();
    let plain = parse_coverage(r#"{"a.py": 0.8}"#).unwrap();
    assert_eq!(wrapped, plain);
  }

  #[test]
  fn criticality_accepts_yaml_and_json() {
    let crit = parse_criticality("src/core: 5\nsrc/api: 2.5\n").unwrap();
    let keys: Vec<_> = crit.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["src/core", "src/api"]);
    assert_eq!(crit["src/core"], 5.0);
    assert_eq!(crit["src/api"], 2.5);

    let json = parse_criticality(r#"{"src/core": 5}"#).unwrap();
    assert_eq!(json["src/core"], 5.0);
  }

  #[test]
  fn empty_criticality_document_is_empty_map() {
    assert!(parse_criticality("").unwrap().is_empty());
    assert!(parse_criticality("~\n").unwrap().is_empty());
  }

  #[test]
  fn criticality_with_non_numeric_tier_is_parse_error() {
    let err = parse_criticality("src/core: high\n").unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
  }

  #[test]
  fn json_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sources.json");
    let sources = Sources {
      hotspots: true,
      ..Sources::default()
    };
    write_json(&path, &sources).unwrap();
    let back: Sources = read_json(&path).unwrap();
    assert_eq!(back, sources);
  }

  #[test]
  fn missing_optional_path_is_none() {
    let loaded: Option<Sources> = read_optional_json(None).unwrap();
    assert!(loaded.is_none());
  }

  #[test]
  fn missing_file_is_io_error() {
    let err = read_text(Path::new("/definitely/not/here.json")).unwrap_err();
    assert!(matches!(err, EngineError::Io { .. }));
  }
}
