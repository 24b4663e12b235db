/// The module index
///
/// Owns every discovered module, keyed by modulefile path, and drives the
/// scan -> analyze -> export lifecycle. Entries live in a fixed number of
/// buckets addressed by an xxHash of the path.

use crate::analysis::{spider, Analyzer};
use crate::core::scanner::Scanner;
use crate::core::searcher::Searcher;
use crate::db::codec::{read_index_file, write_index_file};
use crate::db::models::{ModuleEntry, SearchResult};
use crate::error::{MiiError, Result};
use serde_json::Value;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, info, warn};
use xxhash_rust::xxh32::xxh32;

/// Number of hash buckets
pub const BUCKET_WIDTH: usize = 4096;

/// Index of modules and the commands they provide
pub struct ModuleTable {
    buckets: Vec<Vec<ModuleEntry>>,
    num_modules: usize,
    requiring_analysis: usize,
    analyzed: bool,
    modulepath: Option<String>,
}

impl Default for ModuleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BUCKET_WIDTH],
            num_modules: 0,
            requiring_analysis: 0,
            analyzed: false,
            modulepath: None,
        }
    }

    /// Populate the table by scanning every root in `modulepath`.
    ///
    /// Every module found needs analysis afterwards.
    ///
    /// # Returns
    /// * `Err(MiiError::TableNotEmpty)` - If the table already holds modules
    /// * `Err(MiiError::EmptyModulePath)` - If `modulepath` names no roots
    pub fn generate(&mut self, modulepath: &str) -> Result<usize> {
        if self.num_modules > 0 {
            return Err(MiiError::TableNotEmpty);
        }

        for entry in Scanner::scan(modulepath)? {
            self.insert(entry);
        }

        self.requiring_analysis = self.num_modules;
        self.analyzed = false;
        self.modulepath = Some(modulepath.to_string());

        info!("Generated table with {} modules", self.num_modules);
        Ok(self.num_modules)
    }

    /// Populate the table from Lmod spider JSON.
    ///
    /// Spider output already carries PATH and parent data, so the resulting
    /// table is fully analyzed.
    pub fn generate_from_spider(&mut self, json: &Value) -> Result<usize> {
        if self.num_modules > 0 {
            return Err(MiiError::TableNotEmpty);
        }

        for entry in spider::entries_from_json(json) {
            self.insert(entry);
        }

        self.requiring_analysis = 0;
        self.analyzed = true;

        info!("Imported {} modules from spider output", self.num_modules);
        Ok(self.num_modules)
    }

    /// Load a table previously written by [`ModuleTable::export`].
    ///
    /// The whole file is parsed before anything is inserted; a truncated
    /// file yields an error, never a partial table.
    pub fn import(path: &Path) -> Result<Self> {
        let records = read_index_file(path)?;
        let mut table = Self::new();

        for record in records {
            table.insert(record.into_entry());
        }

        table.analyzed = true;
        debug!("Imported {} modules from {}", table.num_modules, path.display());

        Ok(table)
    }

    /// Reuse analysis results from an earlier index for unchanged modules.
    ///
    /// A cached record applies only when its timestamp is not older than
    /// the freshly scanned one. Returns how many entries were completed.
    pub fn preanalyze(&mut self, path: &Path) -> Result<usize> {
        let records = read_index_file(path)?;
        let mut reused = 0;

        for record in records {
            let Some(entry) = self.get_mut(&record.path) else {
                continue;
            };

            if entry.analysis_complete || record.timestamp < entry.timestamp {
                continue;
            }

            entry.bins = record.bins;
            entry.parents = record.parents;
            entry.analysis_complete = true;
            reused += 1;
        }

        self.requiring_analysis -= reused;
        debug!("Preanalysis reused {} cached modules", reused);

        Ok(reused)
    }

    /// Analyze every module still missing results.
    ///
    /// A module that fails is logged and left incomplete, so it is neither
    /// exported nor searched. Returns how many modules were completed.
    pub fn analyze(&mut self, analyzer: &mut Analyzer) -> usize {
        let mut count = 0;

        if self.requiring_analysis > 0 {
            for entry in self.buckets.iter_mut().flatten() {
                if entry.analysis_complete {
                    continue;
                }

                match analyzer.analyze(&entry.path, entry.dialect) {
                    Ok(bins) => {
                        debug!("analysis for {}: {} bins", entry.code, bins.len());
                        entry.bins = bins;
                        entry.analysis_complete = true;
                        count += 1;
                    }
                    Err(e) => warn!("failed to analyze {}: {}", entry.path.display(), e),
                }
            }

            self.requiring_analysis -= count;
        }

        self.analyzed = true;
        count
    }

    /// Write every complete entry to `path`, replacing its contents.
    ///
    /// Returns the number of entries written.
    pub fn export(&self, path: &Path) -> Result<usize> {
        let complete: Vec<&ModuleEntry> = self.entries().filter(|e| e.analysis_complete).collect();

        write_index_file(path, &complete)?;
        debug!("Exported {} modules to {}", complete.len(), path.display());

        Ok(complete.len())
    }

    /// Modules providing exactly `cmd`
    pub fn search_exact(&self, cmd: &str, loaded: &[String]) -> Result<SearchResult> {
        self.ensure_analyzed()?;
        Ok(Searcher::new(loaded).exact(self.entries(), cmd))
    }

    /// Modules providing a command similar to `cmd`
    pub fn search_fuzzy(&self, cmd: &str, loaded: &[String]) -> Result<SearchResult> {
        self.ensure_analyzed()?;
        Ok(Searcher::new(loaded).fuzzy(self.entries(), cmd))
    }

    /// Commands provided by the module `code`
    pub fn search_by_code(&self, code: &str) -> Result<SearchResult> {
        self.ensure_analyzed()?;
        Ok(Searcher::new(&[]).by_code(self.entries(), code))
    }

    /// Every entry, in bucket order
    pub fn entries(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.buckets.iter().flatten()
    }

    pub fn get(&self, path: &Path) -> Option<&ModuleEntry> {
        self.buckets[bucket_of(path)].iter().find(|e| e.path == path)
    }

    pub fn len(&self) -> usize {
        self.num_modules
    }

    pub fn is_empty(&self) -> bool {
        self.num_modules == 0
    }

    pub fn requiring_analysis(&self) -> usize {
        self.requiring_analysis
    }

    pub fn is_analyzed(&self) -> bool {
        self.analyzed
    }

    /// Roots this table was scanned from, if it was scanned
    pub fn modulepath(&self) -> Option<&str> {
        self.modulepath.as_deref()
    }

    fn ensure_analyzed(&self) -> Result<()> {
        if self.analyzed {
            Ok(())
        } else {
            Err(MiiError::NotAnalyzed)
        }
    }

    fn get_mut(&mut self, path: &Path) -> Option<&mut ModuleEntry> {
        self.buckets[bucket_of(path)].iter_mut().find(|e| e.path == path)
    }

    // A path seen twice (a root listed twice in MODULEPATH) keeps the newer entry
    fn insert(&mut self, entry: ModuleEntry) {
        let bucket = &mut self.buckets[bucket_of(&entry.path)];

        match bucket.iter_mut().find(|e| e.path == entry.path) {
            Some(existing) => *existing = entry,
            None => {
                bucket.push(entry);
                self.num_modules += 1;
            }
        }
    }
}

fn bucket_of(path: &Path) -> usize {
    xxh32(path.as_os_str().as_bytes(), 0) as usize % BUCKET_WIDTH
}
