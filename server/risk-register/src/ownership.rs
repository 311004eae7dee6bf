//! Knowledge concentration per directory from a chronological authorship stream.

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::config::Config;
use crate::hotspot::round_to;
use crate::types::{
  AuthorShare, DirectoryOwnership, LogEntry, OwnershipFlag, OwnershipReport, OwnershipSummary,
};

/// Directory tier assumed when the criticality map has no entry.
pub const DEFAULT_CRITICALITY: f64 = 1.0;

/// Split `git log --name-only --pretty=format:%ae` output into authors and files.
///
/// A line with `@` and no `/` is an author; any other non-blank line with a `/`
/// is a changed path. Everything else (blank separators, root-level files) is skipped.
pub fn parse_log(text: &str) -> Vec<LogEntry> {
  text
    .lines()
    .map(str::trim)
    .filter_map(|line| {
      if line.contains('@') && !line.contains('/') {
        Some(LogEntry::Author(line.to_string()))
      } else if line.contains('/') {
        Some(LogEntry::File(line.to_string()))
      } else {
        None
      }
    })
    .collect()
}

/// Bucket every file change under its directory prefix and classify concentration.
pub fn analyze(
  entries: &[LogEntry],
  criticality: &IndexMap<String, f64>,
  config: &Config,
) -> OwnershipReport {
  let mut dir_author: IndexMap<String, IndexMap<String, u64>> = IndexMap::new();
  let mut current_author: Option<&str> = None;
  let mut orphaned = 0usize;

  for entry in entries {
    match entry {
      LogEntry::Author(identity) => current_author = Some(identity.as_str()),
      LogEntry::File(path) => {
        let Some(author) = current_author else {
          orphaned += 1;
          continue;
        };
        let Some(dir) = directory_key(path, config.directory_depth) else {
          continue;
        };
        *dir_author
          .entry(dir)
          .or_default()
          .entry(author.to_string())
          .or_insert(0) += 1;
      }
    }
  }
  if orphaned > 0 {
    debug!(orphaned, "file entries seen before any author were ignored");
  }

  let mut directories: Vec<DirectoryOwnership> = dir_author
    .into_iter()
    .map(|(path, counter)| {
      let total: u64 = counter.values().sum();
      let mut ranked: Vec<(String, u64)> = counter.into_iter().collect();
      // Stable: equal counts keep first-seen order.
      ranked.sort_by(|a, b| b.1.cmp(&a.1));

      let authors: Vec<AuthorShare> = ranked
        .into_iter()
        .map(|(identity, count)| AuthorShare {
          identity,
          count,
          pct: round_to(count as f64 / total as f64, 3),
        })
        .collect();

      // Compared after rounding, so the reported share and the flag agree.
      let top_concentration = authors.first().map_or(0.0, |a| a.pct);
      let flag = if authors.len() == 1 {
        Some(OwnershipFlag::SingleContributor)
      } else if top_concentration >= config.concentration_threshold {
        Some(OwnershipFlag::HighConcentration)
      } else {
        None
      };
      let criticality = criticality.get(&path).copied().unwrap_or(DEFAULT_CRITICALITY);

      DirectoryOwnership {
        path,
        total_commits: total,
        authors,
        top_concentration,
        criticality,
        flag,
      }
    })
    .collect();

  directories.sort_by(|a, b| {
    b.flag
      .is_some()
      .cmp(&a.flag.is_some())
      .then_with(|| weighted(b).total_cmp(&weighted(a)))
  });

  let summary = OwnershipSummary {
    directories_analyzed: directories.len(),
    time_window_days: config.time_window_days,
    high_concentration_count: count_flag(&directories, OwnershipFlag::HighConcentration),
    single_contributor_count: count_flag(&directories, OwnershipFlag::SingleContributor),
  };
  info!(
    directories = summary.directories_analyzed,
    high_concentration = summary.high_concentration_count,
    single_contributor = summary.single_contributor_count,
    "analyzed ownership"
  );

  OwnershipReport {
    summary,
    directories,
  }
}

fn weighted(d: &DirectoryOwnership) -> f64 {
  d.top_concentration * d.criticality
}

fn count_flag(dirs: &[DirectoryOwnership], flag: OwnershipFlag) -> usize {
  dirs.iter().filter(|d| d.flag == Some(flag)).count()
}

/// Leading `depth` segments of the path. A path with `depth` or fewer
/// segments is its own bucket (`src/main.rs` at depth 2).
fn directory_key(path: &str, depth: usize) -> Option<String> {
  let normalized = normalize_path(path);
  let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
  if segments.is_empty() {
    return None;
  }
  Some(segments[..depth.min(segments.len())].join("/"))
}

/// Normalize a repo path for stable bucketing:
/// - backslash -> forward slash
/// - collapse repeated slashes
/// - strip leading ./
fn normalize_path(p: &str) -> String {
  let s = p.trim().replace('\\', "/");
  let mut out = String::with_capacity(s.len());
  let mut prev_slash = false;
  for ch in s.chars() {
    if ch == '/' {
      if !prev_slash {
        out.push('/');
      }
      prev_slash = true;
    } else {
      prev_slash = false;
      out.push(ch);
    }
  }
  out.strip_prefix("./").unwrap_or(&out).to_string()
}
