use std::{fmt, io};
use thiserror::Error;

/// Unified error type for all gridcast operations.
///
/// Every crate in the workspace returns this enum so failures propagate with `?`
/// across crate boundaries without conversion glue. Callers match on the
/// variant when they need to tell a startup failure from a bad request.
///
/// # Thread Safety
///
/// `Error` implements `Send` and `Sync`, so it can cross thread boundaries
/// together with the query streams that produce it.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error outside of table loading (e.g. writing query output).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Arrow error raised while filtering, joining, or gathering batches.
    ///
    /// Once the tables are loaded these indicate a broken internal invariant
    /// (for instance a schema mismatch between batches) rather than bad input.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A source table could not be loaded.
    ///
    /// Raised when a file is missing or unreadable, when required columns are
    /// absent, when a column has an unsupported type, when a table is empty, or
    /// when the composite key is violated (duplicate primary keys, or duplicate
    /// secondary keys when the join rejects them).
    ///
    /// # Recovery
    ///
    /// None in-process. A load error aborts engine construction; fix the
    /// source data or configuration and start again.
    #[error("load error: {0}")]
    LoadError(String),

    /// The caller asked for metric names the catalog does not declare.
    ///
    /// Carries every offending name, in request order, so a caller can fix the
    /// whole request at once. Raised before any row is produced.
    #[error("invalid metrics: {}", invalid_metrics.join(", "))]
    ValidationError { invalid_metrics: Vec<String> },

    /// Invalid option or API parameter (zero batch size, malformed custom
    /// catalog, unknown strategy name, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// Internal error indicating a bug or unexpected state.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a load error from any displayable error, prefixed with context.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridcast_result::Error;
    ///
    /// let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
    /// let err = Error::load("preds_001.parquet", io_err);
    /// assert!(matches!(err, Error::LoadError(msg) if msg.contains("preds_001.parquet")));
    /// ```
    #[inline]
    pub fn load<C: fmt::Display, E: fmt::Display>(context: C, err: E) -> Self {
        Error::LoadError(format!("{context}: {err}"))
    }

    /// Create a validation error listing the offending metric names.
    #[inline]
    pub fn invalid_metrics<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Error::ValidationError {
            invalid_metrics: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Metric names rejected by validation, if this is a validation error.
    pub fn rejected_metrics(&self) -> Option<&[String]> {
        match self {
            Error::ValidationError { invalid_metrics } => Some(invalid_metrics),
            _ => None,
        }
    }

    /// Whether the caller can recover by changing the request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::ValidationError { .. } | Error::InvalidArgumentError(_)
        )
    }
}
