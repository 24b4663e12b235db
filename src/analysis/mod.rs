/// Modulefile analysis
///
/// Discovers the commands each module provides, either by interpreting
/// TCL modulefiles line by line, by evaluating Lmod modulefiles in a
/// sandbox, or by reading Lmod spider output.

pub mod analyzer;
pub mod bins;
pub mod sandbox;
pub mod spider;
pub mod tcl;

pub use analyzer::Analyzer;
pub use sandbox::{default_sandbox, RegexSandbox, Sandbox};

#[cfg(feature = "lua")]
pub use sandbox::LuaSandbox;
