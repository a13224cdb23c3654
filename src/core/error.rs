use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error category tags, used by callers that branch on failure class
/// rather than on the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Closed,
    Watcher,
    Parse,
    Extract,
    Index,
    Store,
    Search,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Watcher => "watcher",
            Self::Parse => "parse",
            Self::Extract => "extract",
            Self::Index => "index",
            Self::Store => "store",
            Self::Search => "search",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Index handle is closed")]
    Closed,

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Parse error in {file}: {message}")]
    Parse { file: PathBuf, message: String },

    #[error("Extract error: {0}")]
    Extract(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("File not found in index: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Closed => ErrorKind::Closed,
            Self::Watcher(_) | Self::Notify(_) => ErrorKind::Watcher,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Extract(_) => ErrorKind::Extract,
            Self::Index(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Index,
            Self::Store(_) | Self::Sqlite(_) => ErrorKind::Store,
            Self::Search(_) | Self::FileNotFound(_) => ErrorKind::Search,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::Closed.kind(), ErrorKind::Closed);
        assert_eq!(Error::Store("x".into()).kind(), ErrorKind::Store);
        assert_eq!(
            Error::Parse {
                file: "a.ts".into(),
                message: "bad".into()
            }
            .kind(),
            ErrorKind::Parse
        );
        assert_eq!(ErrorKind::Search.as_str(), "search");
    }
}
