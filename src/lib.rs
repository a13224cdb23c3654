//! symdex - persistent code intelligence for TypeScript/JavaScript monorepos
//!
//! Parses every source file into symbols and relations, persists them in an
//! embedded SQLite store with full-text search, and keeps the index in sync
//! with the filesystem through a debounced watcher. Query APIs cover symbol
//! lookup, relation lookup, file statistics and dependency-graph analyses.

pub mod cli;
pub mod core;
pub mod extract;
pub mod graph;
pub mod index;
pub mod parse;
pub mod project;
pub mod query;
pub mod store;
pub mod watch;

pub use crate::core::config::IndexOptions;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::graph::DependencyGraph;
pub use crate::index::{IndexCoordinator, IndexResult};
pub use crate::query::QueryEngine;
pub use crate::store::{OwnerRole, Store};
