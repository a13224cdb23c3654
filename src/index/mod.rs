pub mod coordinator;
pub mod indexer;

pub use coordinator::{ChangedSymbols, IndexCoordinator, IndexResult, SymbolChange};
pub use indexer::FileIndexer;
