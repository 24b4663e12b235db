/// Core functionality modules
///
/// Contains the module table and its lifecycle: scanning module roots,
/// ranking and searching analyzed modules, and keeping the index current.

pub mod indexer;
pub mod module_table;
pub mod ranking;
pub mod scanner;
pub mod searcher;

pub use indexer::{Indexer, SyncReport};
pub use module_table::ModuleTable;
pub use ranking::Ranker;
pub use scanner::Scanner;
pub use searcher::Searcher;
