/// Index lifecycle
///
/// Ties scanning, analysis and the on-disk index together: full rebuilds,
/// incremental syncs and loading with a rebuild when the index is unusable.

use crate::analysis::{default_sandbox, Analyzer};
use crate::config::Config;
use crate::core::module_table::ModuleTable;
use crate::error::Result;
use serde_json::Value;
use tracing::{info, warn};

/// Outcome of a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Modules whose cached results were still fresh
    pub reused: usize,
    /// Modules analyzed from scratch
    pub analyzed: usize,
}

impl SyncReport {
    pub fn up_to_date(&self) -> bool {
        self.analyzed == 0
    }
}

/// Builds, syncs and loads the index described by a [`Config`]
pub struct Indexer<'a> {
    config: &'a Config,
}

impl<'a> Indexer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn analyzer(&self) -> Result<Analyzer> {
        let sandbox = default_sandbox(self.config.sandbox_asset.clone())?;
        Ok(Analyzer::new(sandbox))
    }

    /// Rebuild the index from scratch.
    ///
    /// Returns the number of modules analyzed.
    pub fn build(&self) -> Result<usize> {
        let mut table = ModuleTable::new();
        table.generate(self.config.modulepath()?)?;

        let count = table.analyze(&mut self.analyzer()?);

        if count == 0 {
            warn!("Didn't analyze any modules. Is the MODULEPATH correct?");
        } else {
            info!("Finished analysis on {} modules", count);
        }

        table.export(&self.config.index_file)?;
        Ok(count)
    }

    /// Rebuild the index from Lmod spider JSON instead of scanning
    pub fn build_from_spider(&self, json: &Value) -> Result<usize> {
        let mut table = ModuleTable::new();
        let count = table.generate_from_spider(json)?;

        table.export(&self.config.index_file)?;
        Ok(count)
    }

    /// Bring the index up to date, analyzing only modules that changed.
    ///
    /// An unreadable index degrades to a full analysis. The index is only
    /// rewritten when something was analyzed.
    pub fn sync(&self) -> Result<SyncReport> {
        let mut table = ModuleTable::new();
        table.generate(self.config.modulepath()?)?;

        let reused = match table.preanalyze(&self.config.index_file) {
            Ok(reused) => reused,
            Err(e) => {
                warn!("index preanalysis failed, rebuilding the index: {}", e);
                0
            }
        };

        let analyzed = table.analyze(&mut self.analyzer()?);

        if analyzed > 0 {
            info!("Finished analysis on {} modules", analyzed);
            table.export(&self.config.index_file)?;
        }

        Ok(SyncReport { reused, analyzed })
    }

    /// Load the index, rebuilding it once if it can't be imported
    pub fn load(&self) -> Result<ModuleTable> {
        match ModuleTable::import(&self.config.index_file) {
            Ok(table) => Ok(table),
            Err(e) => {
                warn!("Index import failed ({}), rebuilding..", e);
                self.build()?;

                info!("Trying to import new index..");
                ModuleTable::import(&self.config.index_file)
            }
        }
    }
}
