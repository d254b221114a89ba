use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for `cavity_scan` operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Raised when a numeric parameter is non-finite or outside its domain.
    #[error("invalid {name} = {value}: must be {requirement}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// The value that was supplied.
        value: f64,
        /// Human-readable description of the accepted domain.
        requirement: &'static str,
    },

    /// Raised when a preset splits the coupling sign itself and receives a negative value.
    #[error("coupling must be non-negative for this preset (the down scan is derived), found {coupling}")]
    NegativeCoupling { coupling: f64 },

    /// Raised when temperature and power fields disagree in length.
    #[error("dimension mismatch in {context}: expected {expected} but found {found}")]
    DimensionMismatch {
        /// Which field or buffer was checked.
        context: &'static str,
        /// Point count of the scan, `2 * half_width * n_widths`.
        expected: usize,
        /// Point count of the offending field.
        found: usize,
    },

    /// Raised when the result directory or file cannot be written or renamed.
    #[error("failed to persist results at {}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Raised when the npz encoder rejects a record.
    #[error("failed to encode result archive {}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpzError,
    },

    /// Raised when a stored archive cannot be decoded.
    #[error("failed to read result archive {}", path.display())]
    ArchiveRead {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpzError,
    },
}

impl ScanError {
    /// Helper to format a [`DimensionMismatch`](ScanError::DimensionMismatch) error.
    pub fn dimension_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Helper for out-of-domain configuration values.
    pub fn invalid(name: &'static str, value: f64, requirement: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            requirement,
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, ScanError>;
