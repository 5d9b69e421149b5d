//! Error types for CSL loading, matching and rendering

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}:{line}: {message}", file.display())]
    Descriptor {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Reference table error: {0}")]
    Reference(String),

    #[error("Geometry error in {}: {message}", path.display())]
    Geometry { path: PathBuf, message: String },

    #[error("Texture error in {}: {message}", path.display())]
    Texture { path: PathBuf, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Asset loader is shut down")]
    LoaderShutdown,
}
