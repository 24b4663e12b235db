/// mii library
///
/// Module inverted index: maps shell commands to the environment modules
/// that provide them.

pub mod analysis;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod shell;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::{Indexer, ModuleTable};
pub use error::{MiiError, Result};
