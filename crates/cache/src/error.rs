//! Error types for the cache crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for memoization operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error during store operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or_else(String::new, |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(memo::cache::io),
        help("Check file permissions and ensure the cache root is writable")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "rename")
        operation: String,
    },

    /// Configuration or argument-binding error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(memo::cache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// A completion marker made a promise the entry cannot keep
    #[error("Corrupt cache entry at {}: {message}", path.display())]
    #[diagnostic(
        code(memo::cache::corrupt),
        help("Inspect or delete the entry directory; the store never removes entries on its own")
    )]
    Corrupt {
        /// Directory of the corrupt entry
        path: Box<Path>,
        /// What the entry promised and failed to deliver
        message: String,
    },

    /// Result value could not be serialized on the write path
    #[error("Serialization error: {message}")]
    #[diagnostic(code(memo::cache::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Create a corrupt-entry error
    #[must_use]
    pub fn corrupt(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.as_ref().into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }
}

/// Result type for memoization operations
pub type Result<T> = std::result::Result<T, Error>;
