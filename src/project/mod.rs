pub mod aliases;
pub mod boundaries;

pub use aliases::{load_alias_config, AliasCache, AliasConfig};
pub use boundaries::{discover_boundaries, resolve_file_project, ProjectBoundary};
