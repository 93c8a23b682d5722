//! Error types for duscan
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors carry the path they refer to so log lines stay actionable
//! - Only root-of-request failures become terminal; everything deeper
//!   degrades the answer, not the session

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error type for the duscan application
#[derive(Error, Debug)]
pub enum EngineError {
    /// Directory scanning errors
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// Configuration and CLI errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (server socket, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors produced while listing a directory
#[derive(Error, Debug)]
pub enum ScanError {
    /// Target path does not exist
    #[error("Path not found: '{}'", path.display())]
    NotFound { path: PathBuf },

    /// Target path exists but is not a directory
    #[error("Not a directory: '{}'", path.display())]
    NotADirectory { path: PathBuf },

    /// Directory exists but cannot be opened
    #[error("Permission denied: '{}'", path.display())]
    PermissionDenied { path: PathBuf },

    /// Any other failure opening or iterating the directory
    #[error("Failed to read directory '{}': {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The blocking enumeration task died before producing a result
    #[error("Directory listing task failed: {0}")]
    Join(String),
}

impl ScanError {
    /// Classify an I/O error raised while opening `path`
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ScanError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => ScanError::PermissionDenied {
                path: path.to_path_buf(),
            },
            io::ErrorKind::NotADirectory => ScanError::NotADirectory {
                path: path.to_path_buf(),
            },
            _ => ScanError::ReadDir {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Initial directory is missing or not a directory
    #[error("Invalid root directory '{}': {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    /// Bind address/port pair did not parse
    #[error("Invalid bind address '{addr}': {reason}")]
    InvalidBindAddr { addr: String, reason: String },
}

/// Result type alias for EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for ScanError
pub type ScanResult<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classification() {
        let path = Path::new("/missing");

        let not_found = ScanError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(not_found, ScanError::NotFound { .. }));

        let denied = ScanError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, ScanError::PermissionDenied { .. }));

        let other = ScanError::from_io(path, io::Error::from(io::ErrorKind::TimedOut));
        assert!(matches!(other, ScanError::ReadDir { .. }));
    }

    #[test]
    fn test_error_conversion() {
        let scan_err = ScanError::NotFound {
            path: PathBuf::from("/missing"),
        };
        let engine_err: EngineError = scan_err.into();
        assert!(matches!(engine_err, EngineError::Scan(_)));
    }
}
