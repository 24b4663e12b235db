/// Modulefile analyzer
///
/// Works out which commands a module provides by finding every directory it
/// adds to `PATH` and listing the executables in them.

use crate::analysis::bins::scan_path_value;
use crate::analysis::sandbox::Sandbox;
use crate::analysis::tcl;
use crate::db::models::Dialect;
use crate::error::Result;
use std::path::Path;

/// Dispatches modulefiles to the interpreter for their dialect
pub struct Analyzer {
    sandbox: Box<dyn Sandbox>,
}

impl Analyzer {
    /// Create an analyzer around the session's single sandbox
    pub fn new(sandbox: Box<dyn Sandbox>) -> Self {
        Self { sandbox }
    }

    /// Analyze one modulefile and return the commands it provides.
    ///
    /// Fails if the file can't be read or the sandbox rejects it. Missing
    /// PATH directories are not an error.
    pub fn analyze(&mut self, path: &Path, dialect: Dialect) -> Result<Vec<String>> {
        let bytes = std::fs::read(path)?;
        let source = String::from_utf8_lossy(&bytes);

        let mut bins = Vec::new();

        match dialect {
            Dialect::Tcl => tcl::analyze_source(&source, &mut bins),
            Dialect::Lmod => {
                for value in self.sandbox.run(&source)? {
                    scan_path_value(&value, &mut bins);
                }
            }
        }

        Ok(bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MiiError;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Replays canned PATH values
    struct FakeSandbox {
        paths: Vec<String>,
        fail: bool,
    }

    impl Sandbox for FakeSandbox {
        fn run(&mut self, _source: &str) -> Result<Vec<String>> {
            if self.fail {
                return Err(MiiError::Sandbox("boom".to_string()));
            }
            Ok(self.paths.clone())
        }
    }

    fn make_bin(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, "").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_lmod_uses_sandbox_paths() {
        let temp = TempDir::new().unwrap();
        let with_bin = temp.path().join("a");
        let empty = temp.path().join("b");
        make_bin(&with_bin, "xctl");
        fs::create_dir(&empty).unwrap();

        let modfile = temp.path().join("x.lua");
        fs::write(&modfile, "-- whatever").unwrap();

        let mut analyzer = Analyzer::new(Box::new(FakeSandbox {
            paths: vec![
                with_bin.display().to_string(),
                empty.display().to_string(),
            ],
            fail: false,
        }));

        let bins = analyzer.analyze(&modfile, Dialect::Lmod).unwrap();
        assert_eq!(bins, vec!["xctl"]);
    }

    #[test]
    fn test_sandbox_failure_fails_analysis() {
        let temp = TempDir::new().unwrap();
        let modfile = temp.path().join("x.lua");
        fs::write(&modfile, "").unwrap();

        let mut analyzer = Analyzer::new(Box::new(FakeSandbox {
            paths: Vec::new(),
            fail: true,
        }));

        assert!(analyzer.analyze(&modfile, Dialect::Lmod).is_err());
    }

    #[test]
    fn test_unreadable_module_fails() {
        let mut analyzer = Analyzer::new(Box::new(FakeSandbox {
            paths: Vec::new(),
            fail: false,
        }));

        let err = analyzer
            .analyze(Path::new("/no/such/module"), Dialect::Tcl)
            .unwrap_err();
        assert!(matches!(err, MiiError::Io(_)));
    }

    #[test]
    fn test_tcl_does_not_touch_sandbox() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        make_bin(&bin, "fooctl");

        let modfile = temp.path().join("1.0");
        fs::write(&modfile, format!("#%Module\nprepend-path PATH {}\n", bin.display())).unwrap();

        let mut analyzer = Analyzer::new(Box::new(FakeSandbox {
            paths: Vec::new(),
            fail: true,
        }));

        assert_eq!(analyzer.analyze(&modfile, Dialect::Tcl).unwrap(), vec!["fooctl"]);
    }
}
