use arrow::array::{Array, ArrayRef, UInt32Array, UInt32Builder};
use arrow::datatypes::DataType;
use arrow::row::{RowConverter, SortField};
use arrow::util::display::array_value_to_string;
use gridcast_result::{Error, Result};
use rustc_hash::FxHashMap;

use crate::DuplicateKeyPolicy;

/// Hash index from an encoded composite key to its build-side row.
///
/// Keys are encoded with Arrow's row format so any number of key columns
/// hash as one byte string. Rows with a null key component are never indexed
/// and never match a probe.
#[derive(Debug)]
pub struct KeyIndex {
    key_types: Vec<DataType>,
    map: FxHashMap<Box<[u8]>, u32>,
    duplicates: usize,
    null_keys: usize,
}

impl KeyIndex {
    /// Index the rows of `key_columns`.
    ///
    /// Repeated keys resolve per `policy`: the first row wins under
    /// [`DuplicateKeyPolicy::KeepFirst`], and the build fails with
    /// [`Error::LoadError`] under [`DuplicateKeyPolicy::Reject`]. `label`
    /// names the indexed table in errors and logs.
    pub fn build(label: &str, key_columns: &[ArrayRef], policy: DuplicateKeyPolicy) -> Result<Self> {
        let Some(first) = key_columns.first() else {
            return Err(Error::InvalidArgumentError(
                "key index requires at least one key column".to_string(),
            ));
        };
        let num_rows = first.len();
        if u32::try_from(num_rows).is_err() {
            return Err(Error::LoadError(format!(
                "{label}: {num_rows} rows exceed the join index capacity"
            )));
        }

        let key_types: Vec<DataType> = key_columns.iter().map(|c| c.data_type().clone()).collect();
        let rows = converter(&key_types)?.convert_columns(key_columns)?;

        let mut map: FxHashMap<Box<[u8]>, u32> = FxHashMap::default();
        map.reserve(num_rows);
        let mut duplicates = 0usize;
        let mut null_keys = 0usize;
        for i in 0..num_rows {
            if has_null_key(key_columns, i) {
                null_keys += 1;
                continue;
            }
            let key = rows.row(i);
            if map.contains_key(key.as_ref()) {
                if policy == DuplicateKeyPolicy::Reject {
                    return Err(Error::LoadError(format!(
                        "{label}: duplicate key ({}) at row {i}",
                        render_key(key_columns, i)
                    )));
                }
                duplicates += 1;
                continue;
            }
            map.insert(key.as_ref().into(), i as u32);
        }

        if duplicates > 0 {
            tracing::warn!(
                table = label,
                duplicates,
                "duplicate join keys; keeping the first row for each key"
            );
        }
        if null_keys > 0 {
            tracing::debug!(table = label, null_keys, "rows with null keys are not indexed");
        }

        Ok(Self {
            key_types,
            map,
            duplicates,
            null_keys,
        })
    }

    /// Look up every row of `key_columns`.
    ///
    /// The result has one slot per probe row: the matching build row, or null
    /// when the key is absent or has a null component. It can be passed to
    /// `arrow::compute::take` directly.
    pub fn probe(&self, key_columns: &[ArrayRef]) -> Result<UInt32Array> {
        if key_columns.len() != self.key_types.len() {
            return Err(Error::Internal(format!(
                "probe with {} key columns against an index of {}",
                key_columns.len(),
                self.key_types.len()
            )));
        }
        for (column, expected) in key_columns.iter().zip(&self.key_types) {
            if column.data_type() != expected {
                return Err(Error::InvalidArgumentError(format!(
                    "join key type mismatch: {} vs {expected}",
                    column.data_type()
                )));
            }
        }

        let num_rows = key_columns.first().map_or(0, |c| c.len());
        let rows = converter(&self.key_types)?.convert_columns(key_columns)?;
        let mut matches = UInt32Builder::with_capacity(num_rows);
        for i in 0..num_rows {
            if has_null_key(key_columns, i) {
                matches.append_null();
                continue;
            }
            matches.append_option(self.map.get(rows.row(i).as_ref()).copied());
        }
        Ok(matches.finish())
    }

    /// Number of distinct indexed keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Rows dropped because their key was already indexed.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Rows skipped because a key component was null.
    pub fn null_keys(&self) -> usize {
        self.null_keys
    }
}

fn converter(key_types: &[DataType]) -> Result<RowConverter> {
    let fields = key_types.iter().cloned().map(SortField::new).collect();
    Ok(RowConverter::new(fields)?)
}

fn has_null_key(key_columns: &[ArrayRef], row: usize) -> bool {
    key_columns.iter().any(|c| c.is_null(row))
}

fn render_key(key_columns: &[ArrayRef], row: usize) -> String {
    key_columns
        .iter()
        .map(|c| array_value_to_string(c.as_ref(), row).unwrap_or_else(|_| "?".to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}
