/// Shell integration module
///
/// Installs the init scripts that hand unknown commands to mii, and keeps
/// the switch that turns that integration on and off.

pub mod hook_installer;
pub mod integration;
pub mod shell_detector;

pub use hook_installer::HookInstaller;
pub use integration::Integration;
pub use shell_detector::{Shell, ShellDetector};
