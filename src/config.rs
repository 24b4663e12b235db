/// Runtime configuration
///
/// Resolves where the index lives, which roots to scan and which modules
/// are loaded. Command-line overrides win over the environment, which wins
/// over the defaults.

use crate::error::{MiiError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the index file inside the data directory
pub const INDEX_FILE_NAME: &str = "index";

/// Marker file whose presence disables shell integration
pub const DISABLED_MARKER: &str = "disabled";

const SANDBOX_ASSET_NAME: &str = "sandbox.lua";

/// Resolved settings for one invocation
#[derive(Debug, Clone)]
pub struct Config {
    pub modulepath: Option<String>,
    pub datadir: PathBuf,
    pub index_file: PathBuf,
    pub sandbox_asset: Option<PathBuf>,
    pub loaded_modules: Vec<String>,
}

impl Config {
    /// Build the configuration from the environment.
    ///
    /// # Arguments
    /// * `datadir` - `-d` override; also pins the index to `<datadir>/index`
    /// * `modulepath` - `-m` override for `$MODULEPATH`
    ///
    /// The data directory (and the parent of `$MII_INDEX_FILE`) is created
    /// if missing.
    pub fn from_env(datadir: Option<PathBuf>, modulepath: Option<String>) -> Result<Self> {
        let modulepath = modulepath.or_else(|| env::var("MODULEPATH").ok());

        let (datadir, index_file) = match datadir {
            Some(dir) => {
                let index_file = dir.join(INDEX_FILE_NAME);
                (dir, index_file)
            }
            None => {
                let home = dirs::home_dir().ok_or_else(|| {
                    MiiError::Config("Could not determine home directory".to_string())
                })?;
                let dir = home.join(".mii");

                let index_file = match env::var_os("MII_INDEX_FILE") {
                    Some(file) if !file.is_empty() => {
                        let file = PathBuf::from(file);
                        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                            fs::create_dir_all(parent)?;
                        }
                        file
                    }
                    _ => dir.join(INDEX_FILE_NAME),
                };

                (dir, index_file)
            }
        };

        fs::create_dir_all(&datadir)?;

        let loaded_modules = env::var("LOADEDMODULES")
            .map(|v| split_loaded(&v))
            .unwrap_or_default();

        Ok(Self {
            modulepath,
            datadir,
            index_file,
            sandbox_asset: find_sandbox_asset(),
            loaded_modules,
        })
    }

    /// Module roots to scan
    ///
    /// # Returns
    /// * `Err(MiiError::EmptyModulePath)` - If neither `-m` nor `$MODULEPATH` is set
    pub fn modulepath(&self) -> Result<&str> {
        self.modulepath.as_deref().ok_or(MiiError::EmptyModulePath)
    }

    pub fn disabled_marker(&self) -> PathBuf {
        self.datadir.join(DISABLED_MARKER)
    }
}

/// Split `$LOADEDMODULES` into module codes
pub fn split_loaded(value: &str) -> Vec<String> {
    value
        .split(':')
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

/// Locate an installed sandbox script.
///
/// `$MII_SANDBOX` wins; otherwise the install prefix next to the binary is
/// tried, then the working directory. `None` selects the built-in script.
fn find_sandbox_asset() -> Option<PathBuf> {
    if let Some(path) = env::var_os("MII_SANDBOX").filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }

    let mut candidates = Vec::new();

    if let Some(exe_dir) = env::current_exe().ok().as_deref().and_then(Path::parent) {
        candidates.push(exe_dir.join("../share/mii/lua").join(SANDBOX_ASSET_NAME));
    }
    candidates.push(PathBuf::from(".").join(SANDBOX_ASSET_NAME));

    candidates.into_iter().find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_split_loaded() {
        assert_eq!(split_loaded("gcc/9.2:openmpi/4.1"), vec!["gcc/9.2", "openmpi/4.1"]);
        assert_eq!(split_loaded("::gcc/9.2:"), vec!["gcc/9.2"]);
        assert!(split_loaded("").is_empty());
    }

    #[test]
    #[serial]
    fn test_datadir_override() {
        let temp = TempDir::new().unwrap();
        let datadir = temp.path().join("data");
        env::set_var("MII_INDEX_FILE", temp.path().join("elsewhere/index"));

        let config = Config::from_env(Some(datadir.clone()), Some("/mods".to_string())).unwrap();

        assert!(datadir.is_dir());
        assert_eq!(config.index_file, datadir.join("index"));
        assert_eq!(config.modulepath().unwrap(), "/mods");
        assert_eq!(config.disabled_marker(), datadir.join("disabled"));

        env::remove_var("MII_INDEX_FILE");
    }

    #[test]
    #[serial]
    fn test_index_file_from_env() {
        let temp = TempDir::new().unwrap();
        let index = temp.path().join("nested/dir/index.bin");
        env::set_var("MII_INDEX_FILE", &index);

        let config = Config::from_env(None, None).unwrap();

        assert_eq!(config.index_file, index);
        assert!(index.parent().unwrap().is_dir());

        env::remove_var("MII_INDEX_FILE");
    }

    #[test]
    #[serial]
    fn test_environment_inputs() {
        let temp = TempDir::new().unwrap();
        let asset = temp.path().join("custom.lua");
        env::set_var("MODULEPATH", "/a:/b");
        env::set_var("LOADEDMODULES", "gcc/9.2:cmake/3.20");
        env::set_var("MII_SANDBOX", &asset);

        let config = Config::from_env(Some(temp.path().to_path_buf()), None).unwrap();

        assert_eq!(config.modulepath.as_deref(), Some("/a:/b"));
        assert_eq!(config.loaded_modules, vec!["gcc/9.2", "cmake/3.20"]);
        assert_eq!(config.sandbox_asset, Some(asset));

        env::remove_var("MODULEPATH");
        env::remove_var("LOADEDMODULES");
        env::remove_var("MII_SANDBOX");

        let config = Config::from_env(Some(temp.path().to_path_buf()), None).unwrap();
        assert!(matches!(config.modulepath(), Err(MiiError::EmptyModulePath)));
        assert!(config.loaded_modules.is_empty());
    }
}
