/// Modulefile discovery
///
/// Walks module roots (the entries of a MODULEPATH) and turns every file
/// found into a module entry that still needs analysis.

use crate::db::models::{Dialect, ModuleEntry};
use crate::error::{MiiError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Handles module discovery
pub struct Scanner;

impl Scanner {
    /// Split a colon-separated module path into its roots.
    ///
    /// # Returns
    /// * `Err(MiiError::EmptyModulePath)` - If no non-empty root is present
    pub fn split_roots(modulepath: &str) -> Result<Vec<PathBuf>> {
        let roots: Vec<PathBuf> = modulepath
            .split(':')
            .filter(|r| !r.is_empty())
            .map(PathBuf::from)
            .collect();

        if roots.is_empty() {
            return Err(MiiError::EmptyModulePath);
        }

        Ok(roots)
    }

    /// Scan every root in `modulepath`
    pub fn scan(modulepath: &str) -> Result<Vec<ModuleEntry>> {
        let mut modules = Vec::new();

        for root in Self::split_roots(modulepath)? {
            Self::scan_root(&root, &mut modules)?;
        }

        debug!("Found {} modules", modules.len());
        Ok(modules)
    }

    /// Recursively scan one root.
    ///
    /// Hidden entries are skipped. Unreadable directories are logged and
    /// skipped rather than failing the scan.
    pub fn scan_root(root: &Path, modules: &mut Vec<ModuleEntry>) -> Result<()> {
        // Ensure the path is absolute
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping during module scan: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(rel_path) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let rel_path = rel_path.to_string_lossy();
            let (dialect, code) = Dialect::classify(&rel_path);

            let timestamp = match std::fs::metadata(entry.path()).and_then(|m| m.modified()) {
                Ok(mtime) => chrono::DateTime::<chrono::Utc>::from(mtime).timestamp(),
                Err(e) => {
                    warn!("couldn't stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            debug!("Found module {} at {}", code, entry.path().display());

            modules.push(ModuleEntry::new(
                entry.path().to_path_buf(),
                code.to_string(),
                dialect,
                timestamp,
            ));
        }

        Ok(())
    }
}

// the root itself may live under a dot directory, only its contents count
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}
