/// Command searcher with exact and fuzzy matching
///
/// Provides lookups from a command name to the modules that provide it.

use crate::core::ranking::Ranker;
use crate::db::models::{ModuleEntry, SearchResult, SearchRow};

/// Bins at this edit distance or further are not considered similar
pub const DISTANCE_THRESHOLD: usize = 4;

/// Handles command searching over analyzed modules
pub struct Searcher<'a> {
    ranker: Ranker<'a>,
}

impl<'a> Searcher<'a> {
    /// Create a new searcher instance
    ///
    /// # Arguments
    /// * `loaded` - Codes of the modules the user currently has loaded
    pub fn new(loaded: &'a [String]) -> Self {
        Self {
            ranker: Ranker::new(loaded),
        }
    }

    /// Modules providing exactly `cmd` (case-sensitive).
    ///
    /// One row per module and parent label.
    pub fn exact<'e>(
        &self,
        entries: impl Iterator<Item = &'e ModuleEntry>,
        cmd: &str,
    ) -> SearchResult {
        let mut result = SearchResult::new(cmd);

        for entry in entries.filter(|e| e.analysis_complete) {
            for bin in entry.bins.iter().filter(|b| b.as_str() == cmd) {
                self.push_rows(&mut result, entry, bin, 0);
            }
        }

        Ranker::sort(&mut result.rows);
        result
    }

    /// Commands within `DISTANCE_THRESHOLD` edits of `cmd`, ignoring case
    pub fn fuzzy<'e>(
        &self,
        entries: impl Iterator<Item = &'e ModuleEntry>,
        cmd: &str,
    ) -> SearchResult {
        let mut result = SearchResult::new(cmd);
        let query = cmd.to_lowercase();

        for entry in entries.filter(|e| e.analysis_complete) {
            for bin in &entry.bins {
                let distance = edit_distance(&query, bin);

                if distance < DISTANCE_THRESHOLD {
                    self.push_rows(&mut result, entry, bin, distance);
                }
            }
        }

        Ranker::sort(&mut result.rows);
        result
    }

    /// Every command provided by the first module whose code is `code`
    pub fn by_code<'e>(
        &self,
        mut entries: impl Iterator<Item = &'e ModuleEntry>,
        code: &str,
    ) -> SearchResult {
        let mut result = SearchResult::new(code);

        if let Some(entry) = entries.find(|e| e.analysis_complete && e.code == code) {
            result.rows = entry
                .bins
                .iter()
                .map(|bin| SearchRow {
                    code: entry.code.clone(),
                    bin: bin.clone(),
                    distance: 0,
                    parent: String::new(),
                    priority: 0,
                })
                .collect();
        }

        result
    }

    fn push_rows(&self, result: &mut SearchResult, entry: &ModuleEntry, bin: &str, distance: usize) {
        for parent in entry.parent_labels() {
            result.rows.push(SearchRow {
                code: entry.code.clone(),
                bin: bin.to_string(),
                distance,
                parent: parent.to_string(),
                priority: self.ranker.priority(parent, &entry.code),
            });
        }
    }
}

/// Case-insensitive Levenshtein distance
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(&a.to_lowercase(), &b.to_lowercase())
}
