//! Stable content hashes and risk ids.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::types::DriftSummary;

/// Content hash of a drift summary.
///
/// The summary is serialized with its fixed field order, so equal summaries
/// always hash equal. Uses blake3; the full 64-char hex digest is returned.
pub fn summary_hash(summary: &DriftSummary) -> Result<String, EngineError> {
  let canonical = serde_json::to_vec(summary)?;
  Ok(blake3::hash(&canonical).to_hex().to_string())
}

/// Hands out deterministic ids, suffixing repeats with `#2`, `#3`, ...
#[derive(Debug, Default)]
pub struct IdAllocator {
  seen: HashMap<String, usize>,
}

impl IdAllocator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn allocate(&mut self, base: String) -> String {
    let count = self.seen.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
      return base;
    }
    // The suffixed form could itself collide with a later literal id.
    let mut n = *count;
    loop {
      let candidate = format!("{}#{}", base, n);
      if !self.seen.contains_key(&candidate) {
        self.seen.insert(candidate.clone(), 1);
        if let Some(c) = self.seen.get_mut(&base) {
          *c = n;
        }
        return candidate;
      }
      n += 1;
    }
  }
}
