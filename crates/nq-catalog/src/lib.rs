//! nq-catalog: Schema store backed by an M-Schema JSON file and a directory of SQLite databases.

pub mod dir;
pub mod generate;
pub mod store;

pub use dir::DatabaseDir;
pub use generate::{generate_catalog, write_catalog};
pub use store::{CatalogLoader, CatalogStore, FileCatalogLoader};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {}", .0.display())]
    CatalogNotFound(PathBuf),
    #[error("database not found: {0}")]
    DatabaseNotFound(String),
    #[error("invalid catalog: {0}")]
    Parse(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        CatalogError::Database(e.to_string())
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Io(e.to_string())
    }
}
