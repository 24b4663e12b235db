/// Error types for mii
///
/// This module defines all possible errors that can occur while building,
/// persisting and searching the module index.
/// Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mii operations
#[derive(Error, Debug)]
pub enum MiiError {
    /// I/O errors (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Spider JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Index file does not start with the expected magic bytes
    #[error("Bad magic sequence in index file {}", path.display())]
    BadMagic { path: PathBuf },

    /// Index file was written by an incompatible version
    #[error("Unsupported index format version {0}")]
    UnsupportedVersion(u8),

    /// Index file is truncated or otherwise malformed
    #[error("Corrupt index file: {0}")]
    CorruptIndex(String),

    /// Generation was requested on a table that already holds modules
    #[error("Table already has modules present")]
    TableNotEmpty,

    /// No module roots to scan
    #[error("Empty or blank MODULEPATH")]
    EmptyModulePath,

    /// Search was attempted before every module was analyzed
    #[error("Module table is not fully analyzed")]
    NotAnalyzed,

    /// Modulefile evaluation failed inside the sandbox
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for mii operations
pub type Result<T> = std::result::Result<T, MiiError>;

/// Convert MiiError to a user-friendly error message
impl MiiError {
    pub fn user_message(&self) -> String {
        match self {
            MiiError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            MiiError::Json(e) => {
                format!("Could not read spider output. Details: {}", e)
            }
            MiiError::BadMagic { path } => {
                format!(
                    "{} is not a mii index. Run 'mii build' to regenerate it",
                    path.display()
                )
            }
            MiiError::UnsupportedVersion(v) => {
                format!(
                    "Index format version {} is not supported. Run 'mii build' to regenerate it",
                    v
                )
            }
            MiiError::CorruptIndex(reason) => {
                format!("Index file is corrupt ({}). Run 'mii build'", reason)
            }
            MiiError::TableNotEmpty => {
                "Refusing to generate over a non-empty module table".to_string()
            }
            MiiError::EmptyModulePath => {
                "MODULEPATH is empty. Set it or pass --modulepath".to_string()
            }
            MiiError::NotAnalyzed => {
                "The module index is incomplete. Run 'mii sync' first".to_string()
            }
            MiiError::Sandbox(msg) => {
                format!("Modulefile evaluation failed: {}", msg)
            }
            MiiError::Config(msg) => {
                format!("Configuration issue: {}", msg)
            }
        }
    }
}
