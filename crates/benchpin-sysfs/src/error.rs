//! # sysfs Error Types

use std::path::PathBuf;

use benchpin_core::{MemoryError, TopologyError};

/// Errors that can occur while reading the platform description.
#[derive(Debug, thiserror::Error)]
pub enum SysfsError {
    /// A file or directory could not be read
    #[error("Could not read {}: {source}", .path.display())]
    Io {
        /// The path that failed
        path: PathBuf,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// A file did not have the expected format
    #[error("Could not parse {}: {message}", .path.display())]
    Parse {
        /// The offending file
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },

    /// The discovered topology is unusable
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

impl From<SysfsError> for MemoryError {
    fn from(err: SysfsError) -> Self {
        MemoryError::ConfigurationRead(err.to_string())
    }
}

/// A malformed integer list such as `"0-3,x"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid integer list '{input}': {reason}")]
pub struct IntListError {
    /// The rejected input
    pub input: String,
    /// What was wrong with it
    pub reason: String,
}
