/// Modulefile sandboxes
///
/// A sandbox evaluates an Lmod modulefile without side effects and reports
/// every value the module would have added to `PATH`.

use crate::error::{MiiError, Result};
use regex::Regex;
use std::path::PathBuf;
#[cfg(feature = "lua")]
use tracing::debug;

/// Capability to evaluate modulefile source and capture its PATH edits.
///
/// Implementations hold interpreter state and are not reentrant, hence
/// `&mut self`. One instance serves every module in a session.
pub trait Sandbox {
    /// Returns every PATH value passed to a path-mutating call, in call order
    fn run(&mut self, source: &str) -> Result<Vec<String>>;
}

/// Lua sandbox backed by an embedded interpreter
#[cfg(feature = "lua")]
pub struct LuaSandbox {
    lua: mlua::Lua,
    asset: Option<PathBuf>,
    loaded: bool,
}

#[cfg(feature = "lua")]
impl LuaSandbox {
    /// Script shipped inside the binary, used when no asset is installed
    pub const BUILTIN_SCRIPT: &'static str = include_str!("sandbox.lua");

    /// Create a sandbox. `asset` overrides the built-in sandbox script and
    /// must define a global `sandbox_run(code)` function.
    ///
    /// The script is loaded on first use.
    pub fn new(asset: Option<PathBuf>) -> Self {
        Self {
            lua: mlua::Lua::new(),
            asset,
            loaded: false,
        }
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        let (name, script) = match &self.asset {
            Some(path) => (path.display().to_string(), std::fs::read_to_string(path)?),
            None => ("sandbox.lua".to_string(), Self::BUILTIN_SCRIPT.to_string()),
        };

        debug!("loading sandbox script {}", name);

        self.lua
            .load(script.as_str())
            .set_name(name)
            .exec()
            .map_err(|e| MiiError::Sandbox(format!("failed to load sandbox: {}", e)))?;

        self.loaded = true;
        Ok(())
    }
}

#[cfg(feature = "lua")]
impl Sandbox for LuaSandbox {
    fn run(&mut self, source: &str) -> Result<Vec<String>> {
        self.ensure_loaded()?;

        let run: mlua::Function = self
            .lua
            .globals()
            .get("sandbox_run")
            .map_err(|e| MiiError::Sandbox(format!("sandbox_run is not defined: {}", e)))?;

        let paths: Vec<String> = run
            .call(source)
            .map_err(|e| MiiError::Sandbox(e.to_string()))?;

        Ok(paths)
    }
}

// Matches prepend_path("PATH", "...") and append_path("PATH", "...")
const LMOD_PATH_PATTERN: &str =
    r#"^\s*(?:prepend_path|append_path)\s*\(\s*"PATH"\s*,\s*"([^"]+)""#;

/// Line-oriented fallback that needs no interpreter.
///
/// Only literal string arguments are understood; anything computed at
/// runtime is missed.
pub struct RegexSandbox {
    pattern: Regex,
}

impl RegexSandbox {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(LMOD_PATH_PATTERN)
            .map_err(|e| MiiError::Sandbox(format!("bad path pattern: {}", e)))?;

        Ok(Self { pattern })
    }
}

impl Sandbox for RegexSandbox {
    fn run(&mut self, source: &str) -> Result<Vec<String>> {
        Ok(source
            .lines()
            .filter_map(|line| self.pattern.captures(line))
            .map(|caps| caps[1].to_string())
            .collect())
    }
}

/// The sandbox this build prefers
pub fn default_sandbox(asset: Option<PathBuf>) -> Result<Box<dyn Sandbox>> {
    #[cfg(feature = "lua")]
    {
        Ok(Box::new(LuaSandbox::new(asset)))
    }

    #[cfg(not(feature = "lua"))]
    {
        let _ = asset;
        Ok(Box::new(RegexSandbox::new()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_sandbox() {
        let mut sandbox = RegexSandbox::new().unwrap();
        let source = r#"
help([[Foo]])
prepend_path("PATH", "/opt/foo/bin")
append_path( "PATH" , "/opt/foo/sbin:/opt/foo/libexec")
prepend_path("MANPATH", "/opt/foo/man")
-- prepend_path("PATH", "/commented")
"#;

        let paths = sandbox.run(source).unwrap();
        assert_eq!(paths, vec!["/opt/foo/bin", "/opt/foo/sbin:/opt/foo/libexec"]);
    }

    #[cfg(feature = "lua")]
    mod lua {
        use super::super::*;
        use std::fs;
        use tempfile::TempDir;

        #[test]
        fn test_records_path_calls_in_order() {
            let mut sandbox = LuaSandbox::new(None);
            let source = r#"
local base = "/opt/foo"
prepend_path("PATH", pathJoin(base, "bin"))
append_path("MANPATH", pathJoin(base, "man"))
append_path{"PATH", base .. "/sbin", priority = 10}
"#;

            let paths = sandbox.run(source).unwrap();
            assert_eq!(paths, vec!["/opt/foo/bin", "/opt/foo/sbin"]);
        }

        #[test]
        fn test_setenv_is_sandboxed() {
            let mut sandbox = LuaSandbox::new(None);
            let source = r#"
setenv("MII_SANDBOX_ROOT", "/opt/bar")
prepend_path("PATH", os.getenv("MII_SANDBOX_ROOT") .. "/bin")
"#;

            let paths = sandbox.run(source).unwrap();
            assert_eq!(paths, vec!["/opt/bar/bin"]);
            assert!(std::env::var("MII_SANDBOX_ROOT").is_err());
        }

        #[test]
        fn test_state_does_not_leak_between_runs() {
            let mut sandbox = LuaSandbox::new(None);

            sandbox.run(r#"prepend_path("PATH", "/a")"#).unwrap();
            let paths = sandbox.run(r#"prepend_path("PATH", "/b")"#).unwrap();

            assert_eq!(paths, vec!["/b"]);
        }

        #[test]
        fn test_library_tables_not_shared_between_runs() {
            let mut sandbox = LuaSandbox::new(None);

            sandbox
                .run("string.format = nil; table.concat = nil; math.max = nil")
                .unwrap();

            let paths = sandbox
                .run(r#"prepend_path("PATH", string.format("%s/bin", "/opt")); prepend_path("PATH", pathJoin("/x", "bin"))"#)
                .unwrap();
            assert_eq!(paths, vec!["/opt/bin", "/x/bin"]);

            let err = sandbox.run(r#"LmodError("still ", "broken")"#).unwrap_err();
            assert!(err.to_string().contains("still broken"));
        }

        #[test]
        fn test_no_filesystem_access() {
            let mut sandbox = LuaSandbox::new(None);

            assert!(sandbox.run(r#"io.open("/etc/passwd")"#).is_err());
            assert!(sandbox.run(r#"os.execute("true")"#).is_err());
            assert!(sandbox.run(r#"require("os")"#).is_err());
        }

        #[test]
        fn test_errors_are_reported() {
            let mut sandbox = LuaSandbox::new(None);

            let err = sandbox.run("this is not lua").unwrap_err();
            assert!(matches!(err, MiiError::Sandbox(_)));

            let err = sandbox.run(r#"LmodError("broken module")"#).unwrap_err();
            assert!(err.to_string().contains("broken module"));

            // still usable afterwards
            assert_eq!(sandbox.run(r#"append_path("PATH", "/ok")"#).unwrap(), vec!["/ok"]);
        }

        #[test]
        fn test_custom_asset() {
            let temp = TempDir::new().unwrap();
            let asset = temp.path().join("sandbox.lua");
            fs::write(&asset, "function sandbox_run(code) return { '/x', '/y' } end").unwrap();

            let mut sandbox = LuaSandbox::new(Some(asset));
            assert_eq!(sandbox.run("ignored").unwrap(), vec!["/x", "/y"]);
        }

        #[test]
        fn test_missing_asset_fails() {
            let mut sandbox = LuaSandbox::new(Some("/no/such/sandbox.lua".into()));
            assert!(sandbox.run("").is_err());
        }
    }
}
