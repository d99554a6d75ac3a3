//! Error types for the library module.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while materializing a hardlink.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// Source title would escape the output root.
    #[error("Unsafe title: {title}")]
    UnsafeTitle { title: String },

    /// Hardlinking is switched off.
    #[error("Hardlinking is disabled")]
    Disabled,

    /// No output root is configured.
    #[error("No output root configured")]
    NoOutputRoot,

    /// Source file does not exist on disk.
    #[error("Source file not found: {path}")]
    SourceMissing { path: PathBuf },

    /// A TV file without an episode number has no destination name.
    #[error("No episode number for {name}")]
    NoEpisode { name: String },

    /// Destination resolved outside the output root.
    #[error("Destination escapes the output root: {path}")]
    OutsideRoot { path: PathBuf },

    /// Other file rows already claim the destination.
    #[error("Hardlink conflict on {path}: {names}")]
    Conflict { path: PathBuf, names: String },

    /// Failed to create the destination directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to link the source file to the destination.
    #[error("Failed to link {source_path} to {dest}")]
    LinkFailed {
        source_path: PathBuf,
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store lookup or update failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
