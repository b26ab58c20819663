//! Set-membership row filters over the composite key and region columns.

use arrow::array::{Array, AsArray, BooleanArray, RecordBatch};
use arrow::compute::filter_record_batch;
use arrow::datatypes::{Int64Type, Schema};
use gridcast_catalog::layout::{CELL_ID, PERIOD_ID, REGION_ID};
use gridcast_result::{Error, Result};
use rustc_hash::FxHashSet;

/// Conjunction of up to three allow-lists.
///
/// An unset list passes every row. A set list passes a row iff the row's
/// value is a member; an empty list therefore passes nothing, and a null
/// value never passes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowFilter {
    periods: Option<FxHashSet<i64>>,
    cells: Option<FxHashSet<i64>>,
    regions: Option<FxHashSet<i64>>,
}

impl RowFilter {
    /// A filter that passes every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_periods<I: IntoIterator<Item = i64>>(mut self, periods: I) -> Self {
        self.periods = Some(periods.into_iter().collect());
        self
    }

    pub fn with_cells<I: IntoIterator<Item = i64>>(mut self, cells: I) -> Self {
        self.cells = Some(cells.into_iter().collect());
        self
    }

    pub fn with_regions<I: IntoIterator<Item = i64>>(mut self, regions: I) -> Self {
        self.regions = Some(regions.into_iter().collect());
        self
    }

    pub fn periods(&self) -> Option<&FxHashSet<i64>> {
        self.periods.as_ref()
    }

    pub fn cells(&self) -> Option<&FxHashSet<i64>> {
        self.cells.as_ref()
    }

    pub fn regions(&self) -> Option<&FxHashSet<i64>> {
        self.regions.as_ref()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.clauses().next().is_none()
    }

    /// Whether some allow-list is empty, so no row can pass.
    pub fn matches_nothing(&self) -> bool {
        self.clauses().any(|(_, set)| set.is_empty())
    }

    fn clauses(&self) -> impl Iterator<Item = (&'static str, &FxHashSet<i64>)> + '_ {
        [
            (PERIOD_ID, self.periods.as_ref()),
            (CELL_ID, self.cells.as_ref()),
            (REGION_ID, self.regions.as_ref()),
        ]
        .into_iter()
        .filter_map(|(column, set)| set.map(|s| (column, s)))
    }

    /// Resolve the filter's columns against a batch schema.
    pub fn bind(&self, schema: &Schema) -> Result<BoundFilter<'_>> {
        let clauses = self
            .clauses()
            .map(|(column, set)| {
                schema
                    .index_of(column)
                    .map(|idx| (idx, set))
                    .map_err(|_| Error::Internal(format!("filter column '{column}' not in scan")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BoundFilter {
            clauses,
            matches_nothing: self.matches_nothing(),
        })
    }
}

/// A [`RowFilter`] resolved to column positions of one schema.
#[derive(Debug)]
pub struct BoundFilter<'f> {
    clauses: Vec<(usize, &'f FxHashSet<i64>)>,
    matches_nothing: bool,
}

impl BoundFilter<'_> {
    /// Selection mask for `batch`, or `None` when every row passes.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<Option<BooleanArray>> {
        if self.clauses.is_empty() {
            return Ok(None);
        }
        let num_rows = batch.num_rows();
        if self.matches_nothing {
            return Ok(Some(BooleanArray::from(vec![false; num_rows])));
        }

        let mut keep = vec![true; num_rows];
        for &(idx, set) in &self.clauses {
            let column = batch
                .column(idx)
                .as_primitive_opt::<Int64Type>()
                .ok_or_else(|| {
                    Error::Internal(format!(
                        "filter column {idx} has type {}, expected Int64",
                        batch.column(idx).data_type()
                    ))
                })?;
            for (row, slot) in keep.iter_mut().enumerate() {
                if *slot {
                    *slot = column.is_valid(row) && set.contains(&column.value(row));
                }
            }
        }

        if keep.iter().all(|&k| k) {
            return Ok(None);
        }
        Ok(Some(BooleanArray::from(keep)))
    }

    /// Keep the passing rows of `batch`, preserving order.
    pub fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        if self.matches_nothing {
            return Ok(batch.slice(0, 0));
        }
        match self.evaluate(&batch)? {
            None => Ok(batch),
            Some(mask) => Ok(filter_record_batch(&batch, &mask)?),
        }
    }
}
