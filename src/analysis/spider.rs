/// Lmod spider import
///
/// Lmod can describe its whole module tree as JSON, including the parent
/// chains of hierarchical modules. Each module record is an object keyed by
/// its modulefile path:
///
/// ```json
/// { "/apps/mods/Core/gcc/9.2.lua": {
///       "fullName": "gcc/9.2",
///       "parentAA": [["compiler/x", "mpi/y"]],
///       "pathA": { "/apps/gcc/9.2/bin": 1 } } }
/// ```
///
/// Records may be nested under per-package objects; any object carrying a
/// `fullName` is treated as a module.

use crate::analysis::bins::scan_path_value;
use crate::db::models::{Dialect, ModuleEntry};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Collect every module record found in `json`.
///
/// Records whose modulefile can't be stat'ed are skipped.
pub fn entries_from_json(json: &Value) -> Vec<ModuleEntry> {
    let mut entries = Vec::new();
    collect(json, &mut entries);
    entries
}

fn collect(value: &Value, out: &mut Vec<ModuleEntry>) {
    let Value::Object(map) = value else { return };

    for (key, child) in map {
        if child.get("fullName").is_some() {
            if let Some(entry) = parse_module(key, child) {
                out.push(entry);
            }
        } else {
            collect(child, out);
        }
    }
}

fn parse_module(path: &str, record: &Value) -> Option<ModuleEntry> {
    let code = record.get("fullName")?.as_str()?;

    let timestamp = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => chrono::DateTime::<chrono::Utc>::from(mtime).timestamp(),
        Err(e) => {
            warn!("couldn't stat {}: {}", path, e);
            return None;
        }
    };

    let mut entry = ModuleEntry::new(PathBuf::from(path), code.to_string(), Dialect::Lmod, timestamp);
    entry.parents = Some(parent_labels(record.get("parentAA")));

    if let Some(Value::Object(dirs)) = record.get("pathA") {
        for dir in dirs.keys() {
            scan_path_value(dir, &mut entry.bins);
        }
    }

    entry.analysis_complete = true;
    debug!("spider: {} ({} bins)", entry.code, entry.bins.len());

    Some(entry)
}

/// Each parent chain becomes one label, its codes joined by spaces
fn parent_labels(parent_aa: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(chains)) = parent_aa else {
        return Vec::new();
    };

    chains
        .iter()
        .filter_map(Value::as_array)
        .map(|chain| {
            chain
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_entries_from_json() {
        let temp = TempDir::new().unwrap();
        let modfile = temp.path().join("openmpi-4.1.lua");
        fs::write(&modfile, "").unwrap();

        let bin = temp.path().join("bin");
        fs::create_dir(&bin).unwrap();
        fs::write(bin.join("mpirun"), "").unwrap();
        fs::set_permissions(bin.join("mpirun"), fs::Permissions::from_mode(0o755)).unwrap();

        let modkey = modfile.to_str().unwrap();
        let binkey = bin.to_str().unwrap();
        let json = json!({
            "openmpi": {
                modkey: {
                    "fullName": "openmpi/4.1",
                    "parentAA": [["gcc/9.2"], ["intel/19", "impi/2019"]],
                    "pathA": { binkey: 1 }
                },
                "/does/not/exist.lua": { "fullName": "ghost/1.0" }
            }
        });

        let entries = entries_from_json(&json);
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.code, "openmpi/4.1");
        assert_eq!(entry.bins, vec!["mpirun"]);
        assert_eq!(
            entry.parents,
            Some(vec!["gcc/9.2".to_string(), "intel/19 impi/2019".to_string()])
        );
        assert!(entry.analysis_complete);
    }

    #[test]
    fn test_top_level_module_has_empty_parents() {
        let temp = TempDir::new().unwrap();
        let modfile = temp.path().join("cmake.lua");
        fs::write(&modfile, "").unwrap();

        let modkey = modfile.to_str().unwrap();
        let json = json!({ modkey: { "fullName": "cmake/3.20" } });

        let entries = entries_from_json(&json);
        assert_eq!(entries[0].parents, Some(Vec::new()));
        assert!(entries[0].bins.is_empty());
    }
}
