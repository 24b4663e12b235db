/// Ranking for search results
///
/// Rows are ordered by edit distance, then by how relevant the module is to
/// what the user already has loaded, then by parent label and finally by
/// module code with version-aware comparison.

use crate::db::models::SearchRow;
use std::cmp::Ordering;

/// The providing module itself is already loaded
pub const PRIORITY_LOADED_MODULE: i32 = i32::MAX;

/// Module has no parents, so it can be loaded right away.
/// Must stay above any sum of loaded-parent points.
pub const PRIORITY_TOP_LEVEL: i32 = 1 << 16;

/// One loaded module appears in the row's parent chain
pub const PRIORITY_LOADED_PARENT: i32 = 1;

/// Scores rows against the user's loaded modules
pub struct Ranker<'a> {
    loaded: &'a [String],
}

impl<'a> Ranker<'a> {
    /// # Arguments
    /// * `loaded` - Codes of the currently loaded modules
    pub fn new(loaded: &'a [String]) -> Self {
        Self { loaded }
    }

    /// Priority of a row providing a command from `code` via `parent`
    pub fn priority(&self, parent: &str, code: &str) -> i32 {
        if self.loaded.is_empty() {
            return if parent.is_empty() { PRIORITY_TOP_LEVEL } else { 0 };
        }

        let mut priority: i32 = 0;

        for module in self.loaded {
            if module == code {
                return PRIORITY_LOADED_MODULE;
            }

            if !parent.is_empty() && parent.contains(module.as_str()) {
                priority = priority.saturating_add(PRIORITY_LOADED_PARENT);
            }
        }

        if parent.is_empty() {
            PRIORITY_TOP_LEVEL
        } else {
            priority
        }
    }

    /// Sort rows into final display order. The sort is stable.
    pub fn sort(rows: &mut [SearchRow]) {
        rows.sort_by(compare_rows);
    }
}

/// Total order over rows: distance asc, priority desc, parent asc, code asc
pub fn compare_rows(a: &SearchRow, b: &SearchRow) -> Ordering {
    a.distance
        .cmp(&b.distance)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| a.parent.cmp(&b.parent))
        .then_with(|| compare_codes(&a.code, &b.code))
}

/// Compare module codes by name, then by version.
///
/// `gcc/9.2` sorts before `gcc/11.2`: version fields are compared as numbers
/// when both sides are numeric and as strings otherwise. When one version is
/// a prefix of the other the shorter one sorts first.
pub fn compare_codes(a: &str, b: &str) -> Ordering {
    let (name_a, version_a) = a.split_once('/').unwrap_or((a, ""));
    let (name_b, version_b) = b.split_once('/').unwrap_or((b, ""));

    name_a
        .cmp(name_b)
        .then_with(|| compare_versions(version_a, version_b))
}

fn version_fields(version: &str) -> Vec<&str> {
    if version.is_empty() {
        Vec::new()
    } else {
        version.split('.').collect()
    }
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    let (fields_a, fields_b) = (version_fields(a), version_fields(b));

    for (x, y) in fields_a.iter().zip(fields_b.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };

        if ord != Ordering::Equal {
            return ord;
        }
    }

    fields_a.len().cmp(&fields_b.len())
}
