use crate::error::Error;

/// Result type alias used throughout gridcast.
pub type Result<T> = std::result::Result<T, Error>;
