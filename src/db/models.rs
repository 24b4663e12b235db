/// Data models for the module index
///
/// Entries are what the scanner discovers and the analyzer completes;
/// search rows are what queries hand back to the CLI.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// File extension that marks an Lmod (Lua) modulefile
pub const LMOD_EXTENSION: &str = ".lua";

/// Modulefile scripting dialect
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Lmod,
    Tcl,
}

impl Dialect {
    /// Classify a module by its relative path.
    ///
    /// Returns the dialect and the load code (the path with the Lmod
    /// extension stripped). Anything that is not `*.lua` is assumed TCL.
    pub fn classify(rel_path: &str) -> (Dialect, &str) {
        if rel_path.len() > LMOD_EXTENSION.len() {
            if let Some(code) = rel_path.strip_suffix(LMOD_EXTENSION) {
                return (Dialect::Lmod, code);
            }
        }

        (Dialect::Tcl, rel_path)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dialect::Lmod => "lmod",
            Dialect::Tcl => "tcl",
        };
        write!(f, "{}", s)
    }
}

/// One discovered modulefile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleEntry {
    pub path: PathBuf,
    pub code: String,
    pub dialect: Dialect,
    pub timestamp: i64, // seconds since the epoch
    pub bins: Vec<String>,
    /// `None` when parent data is unknown, `Some(vec![])` for a top-level module
    pub parents: Option<Vec<String>>,
    pub analysis_complete: bool,
}

impl ModuleEntry {
    /// Create a fresh entry that still needs analysis
    pub fn new(path: PathBuf, code: String, dialect: Dialect, timestamp: i64) -> Self {
        Self {
            path,
            code,
            dialect,
            timestamp,
            bins: Vec::new(),
            parents: None,
            analysis_complete: false,
        }
    }

    /// Parent labels to emit search rows for.
    ///
    /// A module without parents yields a single empty label so it still
    /// produces exactly one row.
    pub fn parent_labels(&self) -> Vec<&str> {
        match &self.parents {
            Some(parents) if !parents.is_empty() => parents.iter().map(String::as_str).collect(),
            _ => vec![""],
        }
    }
}

/// Relevance tier for display, derived from edit distance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Exact,
    High,
    Medium,
    Low,
}

impl Relevance {
    pub fn from_distance(distance: usize) -> Self {
        match distance {
            0 => Relevance::Exact,
            1 => Relevance::High,
            2 => Relevance::Medium,
            _ => Relevance::Low,
        }
    }
}

impl std::fmt::Display for Relevance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Relevance::Exact => "exact",
            Relevance::High => "high",
            Relevance::Medium => "medium",
            Relevance::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// A single ranked match
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRow {
    pub code: String,
    pub bin: String,
    pub distance: usize,
    pub parent: String,
    pub priority: i32,
}

impl SearchRow {
    pub fn relevance(&self) -> Relevance {
        Relevance::from_distance(self.distance)
    }
}

/// Output of a query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub query: String,
    pub rows: Vec<SearchRow>,
}

impl SearchResult {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// First `limit` distinct bins, in ranked order
    pub fn unique_bins(&self, limit: usize) -> Vec<&str> {
        let mut seen = HashSet::new();

        self.rows
            .iter()
            .map(|row| row.bin.as_str())
            .filter(|bin| seen.insert(*bin))
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, bin: &str, distance: usize) -> SearchRow {
        SearchRow {
            code: code.to_string(),
            bin: bin.to_string(),
            distance,
            parent: String::new(),
            priority: 0,
        }
    }

    #[test]
    fn test_classify_dialect() {
        assert_eq!(Dialect::classify("gcc/11.2.0.lua"), (Dialect::Lmod, "gcc/11.2.0"));
        assert_eq!(Dialect::classify("gcc/11.2.0"), (Dialect::Tcl, "gcc/11.2.0"));
        // bare extension is not long enough to be an Lmod module
        assert_eq!(Dialect::classify(".lua"), (Dialect::Tcl, ".lua"));
    }

    #[test]
    fn test_parent_labels() {
        let mut entry = ModuleEntry::new("/m/foo/1.0".into(), "foo/1.0".into(), Dialect::Tcl, 0);
        assert_eq!(entry.parent_labels(), vec![""]);

        entry.parents = Some(Vec::new());
        assert_eq!(entry.parent_labels(), vec![""]);

        entry.parents = Some(vec!["gcc/9.2".to_string(), "intel/19".to_string()]);
        assert_eq!(entry.parent_labels(), vec!["gcc/9.2", "intel/19"]);
    }

    #[test]
    fn test_relevance_tiers() {
        assert_eq!(row("a", "b", 0).relevance(), Relevance::Exact);
        assert_eq!(row("a", "b", 2).relevance(), Relevance::Medium);
        assert_eq!(Relevance::from_distance(3).to_string(), "low");
    }

    #[test]
    fn test_unique_bins() {
        let mut result = SearchResult::new("gcc");
        result.rows.push(row("gcc/9", "gcc", 0));
        result.rows.push(row("gcc/11", "gcc", 0));
        result.rows.push(row("clang/12", "gcc-ar", 3));
        result.rows.push(row("gcc/11", "g++", 3));

        assert_eq!(result.unique_bins(10), vec!["gcc", "gcc-ar", "g++"]);
        assert_eq!(result.unique_bins(2), vec!["gcc", "gcc-ar"]);
    }
}
