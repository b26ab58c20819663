//! Error types and result definitions for gridcast.
//!
//! Every crate in the workspace returns [`Result<T>`] with the single [`Error`]
//! enum, so failures cross crate boundaries with `?` and callers can match on a
//! variant to decide how to react.
//!
//! # Error Categories
//!
//! - **Startup failures** ([`Error::LoadError`]): unreadable sources, missing or
//!   mistyped columns, composite key violations. Fatal for the engine being built.
//! - **Request failures** ([`Error::ValidationError`]): unknown metric names,
//!   reported all at once.
//! - **Option errors** ([`Error::InvalidArgumentError`]): bad configuration values.
//! - **Data format errors** ([`Error::Arrow`]) and **I/O** ([`Error::Io`]).
//! - **Internal errors** ([`Error::Internal`]): bugs or violated invariants.
//!
//! An empty query result is never an error.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
