/// Persistence for the module index
///
/// Data models shared across the crate and the binary index file codec.

pub mod codec;
pub mod models;

pub use codec::{read_index_file, write_index_file, CachedModule};
pub use models::*;
