/// Shell detection logic
///
/// Detects which shell the user is running and provides shell-specific configuration paths.

use crate::error::{MiiError, Result};
use std::env;
use std::path::Path;

/// Supported shells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
}

impl Shell {
    /// Every shell mii can integrate with
    pub const ALL: [Shell; 2] = [Shell::Bash, Shell::Zsh];

    /// Get the shell name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
        }
    }

    /// Parse a shell name such as `bash` or `/usr/bin/zsh`
    pub fn from_name(name: &str) -> Option<Shell> {
        let name = name.rsplit('/').next().unwrap_or(name).to_lowercase();

        match name.as_str() {
            "bash" => Some(Shell::Bash),
            "zsh" => Some(Shell::Zsh),
            _ => None,
        }
    }

    /// Get the init script file name for this shell
    pub fn hook_filename(&self) -> &'static str {
        match self {
            Shell::Bash => "bash.sh",
            Shell::Zsh => "zsh.sh",
        }
    }

    /// RC file, relative to the home directory, that sources the init script
    pub fn rc_file_name(&self) -> &'static str {
        match self {
            Shell::Bash => ".bashrc",
            Shell::Zsh => ".zshrc",
        }
    }

    /// Get the source command for this shell
    pub fn source_command(&self, hook_path: &Path) -> String {
        format!(
            "[ -f \"{}\" ] && source \"{}\"",
            hook_path.display(),
            hook_path.display()
        )
    }
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Shell detector
pub struct ShellDetector;

impl ShellDetector {
    /// Detect the current shell from `$SHELL`
    ///
    /// # Returns
    /// * `Ok(Shell)` - The detected shell
    /// * `Err(MiiError)` - If `$SHELL` is unset or names an unsupported shell
    pub fn detect() -> Result<Shell> {
        let shell_path = env::var("SHELL").map_err(|_| {
            MiiError::Config("$SHELL is not set, cannot detect your shell".to_string())
        })?;

        Shell::from_name(&shell_path).ok_or_else(|| {
            MiiError::Config(format!(
                "Unsupported shell {}! Supported shells are 'bash', 'zsh'",
                shell_path
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;

    #[test]
    fn test_shell_from_name() {
        assert_eq!(Shell::from_name("bash"), Some(Shell::Bash));
        assert_eq!(Shell::from_name("/usr/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(Shell::from_name("/bin/BASH"), Some(Shell::Bash));
        assert_eq!(Shell::from_name("/usr/bin/fish"), None);
    }

    #[test]
    fn test_shell_display() {
        assert_eq!(Shell::Bash.to_string(), "bash");
        assert_eq!(Shell::Zsh.to_string(), "zsh");
    }

    #[test]
    fn test_source_command() {
        let path = PathBuf::from("/home/user/.mii/init/bash.sh");

        let cmd = Shell::Bash.source_command(&path);
        assert!(cmd.contains("source"));
        assert!(cmd.contains("/home/user/.mii/init/bash.sh"));
    }

    #[test]
    #[serial]
    fn test_detect() {
        let saved = env::var_os("SHELL");

        env::set_var("SHELL", "/bin/zsh");
        assert_eq!(ShellDetector::detect().unwrap(), Shell::Zsh);

        env::set_var("SHELL", "/bin/tcsh");
        assert!(ShellDetector::detect().is_err());

        match saved {
            Some(shell) => env::set_var("SHELL", shell),
            None => env::remove_var("SHELL"),
        }
    }
}
