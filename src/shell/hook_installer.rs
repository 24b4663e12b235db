/// Hook installer
///
/// Handles installation and uninstallation of the shell init scripts that
/// route unknown commands through `mii select`.

use crate::error::{MiiError, Result};
use crate::shell::{Shell, ShellDetector};
use std::fs;
use std::path::{Path, PathBuf};

/// Init script contents embedded at compile time
const BASH_HOOK: &str = include_str!("../../hooks/bash.sh");
const ZSH_HOOK: &str = include_str!("../../hooks/zsh.sh");

const RC_MARKER: &str = "# mii shell integration (auto-generated)";

/// Hook installer
pub struct HookInstaller {
    hooks_dir: PathBuf,
    home: PathBuf,
}

impl HookInstaller {
    /// Create a new hook installer
    ///
    /// # Arguments
    /// * `datadir` - The mii data directory; scripts go under `init/`
    ///
    /// # Returns
    /// * `Err(MiiError)` - If home directory cannot be determined
    pub fn new(datadir: &Path) -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| MiiError::Config("Could not determine home directory".to_string()))?;

        Ok(Self {
            hooks_dir: datadir.join("init"),
            home,
        })
    }

    /// Install hooks for the detected shell
    pub fn install_auto(&self) -> Result<Shell> {
        let shell = ShellDetector::detect()?;
        self.install(shell)?;
        Ok(shell)
    }

    /// Install the init script for `shell` and source it from the RC file.
    ///
    /// Installing twice leaves a single source line.
    pub fn install(&self, shell: Shell) -> Result<()> {
        fs::create_dir_all(&self.hooks_dir)?;

        let hook_path = self.hooks_dir.join(shell.hook_filename());
        fs::write(&hook_path, hook_content(shell))?;

        self.update_rc_file(shell, &hook_path)
    }

    /// Remove the source line and the init script for `shell`
    pub fn uninstall(&self, shell: Shell) -> Result<()> {
        let hook_path = self.hooks_dir.join(shell.hook_filename());
        let rc_path = self.rc_file_path(shell);

        if rc_path.exists() {
            let content = fs::read_to_string(&rc_path)?;
            let source_cmd = shell.source_command(&hook_path);

            let mut new_content = content
                .lines()
                .filter(|line| *line != source_cmd && *line != RC_MARKER)
                .collect::<Vec<_>>()
                .join("\n");
            new_content.push('\n');

            fs::write(&rc_path, new_content)?;
        }

        if hook_path.exists() {
            fs::remove_file(&hook_path)?;
        }

        Ok(())
    }

    /// Check if hooks are installed for a shell
    pub fn is_installed(&self, shell: Shell) -> bool {
        let hook_path = self.hooks_dir.join(shell.hook_filename());
        if !hook_path.exists() {
            return false;
        }

        fs::read_to_string(self.rc_file_path(shell))
            .map(|content| content.contains(&shell.source_command(&hook_path)))
            .unwrap_or(false)
    }

    pub fn rc_file_path(&self, shell: Shell) -> PathBuf {
        self.home.join(shell.rc_file_name())
    }

    fn update_rc_file(&self, shell: Shell, hook_path: &Path) -> Result<()> {
        let rc_path = self.rc_file_path(shell);

        let mut content = if rc_path.exists() {
            fs::read_to_string(&rc_path)?
        } else {
            String::new()
        };

        let source_cmd = shell.source_command(hook_path);
        if content.contains(&source_cmd) {
            return Ok(());
        }

        if !content.ends_with('\n') && !content.is_empty() {
            content.push('\n');
        }

        content.push('\n');
        content.push_str(RC_MARKER);
        content.push('\n');
        content.push_str(&source_cmd);
        content.push('\n');

        fs::write(&rc_path, content)?;

        Ok(())
    }
}

/// Init script for a specific shell
pub fn hook_content(shell: Shell) -> &'static str {
    match shell {
        Shell::Bash => BASH_HOOK,
        Shell::Zsh => ZSH_HOOK,
    }
}
