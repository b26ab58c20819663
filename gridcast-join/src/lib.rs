//! Left outer hash join over gridcast column tables.
//!
//! This crate exposes the join primitives both execution strategies share:
//! a [`KeyIndex`] over the right table's composite key, the
//! [`LeftJoinIndex`] build side that gathers any subset of right columns for
//! a batch of left rows, and [`ensure_unique_keys`] for validating the left
//! table at load time. The index is built once; which right columns a probe
//! gathers is decided per call.
#![forbid(unsafe_code)]

mod hash_join;
mod index;

use gridcast_result::{Error, Result};
use rustc_hash::FxHashSet;
use std::fmt;
use std::str::FromStr;

pub use hash_join::{LeftJoinIndex, LeftJoinStream, ensure_unique_keys};
pub use index::KeyIndex;

/// Join key pair describing which columns to equate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JoinKey {
    /// Column name in the left (probe) table.
    pub left_column: String,
    /// Column name in the right (build) table.
    pub right_column: String,
}

impl JoinKey {
    pub fn new(left_column: impl Into<String>, right_column: impl Into<String>) -> Self {
        Self {
            left_column: left_column.into(),
            right_column: right_column.into(),
        }
    }

    /// Key column carrying the same name on both sides.
    pub fn same(column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            left_column: column.clone(),
            right_column: column,
        }
    }
}

/// What to do when the right table repeats a composite key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DuplicateKeyPolicy {
    /// The first row in table order wins; later rows are ignored and counted
    /// in a warning.
    #[default]
    KeepFirst,
    /// Building the join fails with a load error.
    Reject,
}

impl fmt::Display for DuplicateKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateKeyPolicy::KeepFirst => write!(f, "keep-first"),
            DuplicateKeyPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for DuplicateKeyPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep-first" | "keep_first" | "first" => Ok(DuplicateKeyPolicy::KeepFirst),
            "reject" => Ok(DuplicateKeyPolicy::Reject),
            other => Err(Error::InvalidArgumentError(format!(
                "unknown duplicate key policy '{other}' (expected 'keep-first' or 'reject')"
            ))),
        }
    }
}

/// Options controlling join construction.
#[derive(Clone, Debug, Default)]
pub struct JoinOptions {
    /// How repeated right-side keys are resolved.
    pub duplicate_keys: DuplicateKeyPolicy,
}

impl JoinOptions {
    /// Set the duplicate key policy.
    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }
}

/// Validate join keys before building an index.
///
/// At least one key is required and no column may appear twice on either side.
pub fn validate_join_keys(keys: &[JoinKey]) -> Result<()> {
    if keys.is_empty() {
        return Err(Error::InvalidArgumentError(
            "left join requires at least one key".to_string(),
        ));
    }
    let mut left = FxHashSet::default();
    let mut right = FxHashSet::default();
    for key in keys {
        if !left.insert(key.left_column.as_str()) || !right.insert(key.right_column.as_str()) {
            return Err(Error::InvalidArgumentError(format!(
                "join key {} = {} repeats a column",
                key.left_column, key.right_column
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_key_constructors() {
        let key = JoinKey::new("month_id", "period");
        assert_eq!(key.left_column, "month_id");
        assert_eq!(key.right_column, "period");

        let same = JoinKey::same("priogrid_id");
        assert_eq!(same.left_column, same.right_column);
    }

    #[test]
    fn test_join_options_builders() {
        assert_eq!(
            JoinOptions::default().duplicate_keys,
            DuplicateKeyPolicy::KeepFirst
        );
        let strict = JoinOptions::default().with_duplicate_keys(DuplicateKeyPolicy::Reject);
        assert_eq!(strict.duplicate_keys, DuplicateKeyPolicy::Reject);
    }

    #[test]
    fn test_validate_join_keys() {
        assert!(validate_join_keys(&[]).is_err());
        assert!(validate_join_keys(&[JoinKey::same("a"), JoinKey::same("b")]).is_ok());
        assert!(validate_join_keys(&[JoinKey::same("a"), JoinKey::new("b", "a")]).is_err());
    }

    #[test]
    fn test_duplicate_key_policy_round_trip() {
        for policy in [DuplicateKeyPolicy::KeepFirst, DuplicateKeyPolicy::Reject] {
            assert_eq!(policy.to_string().parse::<DuplicateKeyPolicy>().unwrap(), policy);
        }
        assert!("merge".parse::<DuplicateKeyPolicy>().is_err());
    }
}
