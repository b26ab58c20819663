//! The seam between the engine and its two join strategies.

use std::fmt::Debug;

use arrow::datatypes::SchemaRef;
use gridcast_catalog::MetricSelection;
use gridcast_result::Result;
use gridcast_scan::{RowFilter, ScanBatches};

use crate::options::JoinStrategy;

/// The primary table left-joined with the secondary table, however the join
/// is realized.
///
/// Implementations are immutable after construction and shared across
/// threads; every scan is an independent, single-pass iterator.
pub trait JoinedTable: Send + Sync + Debug {
    fn strategy(&self) -> JoinStrategy;

    /// Primary rows, which is also the number of joined rows.
    fn num_rows(&self) -> usize;

    /// Schema of an unfiltered scan over every catalog metric.
    fn schema(&self) -> SchemaRef;

    /// Stream the rows passing `filter`, carrying at least the base columns
    /// and every source column `selection` reads.
    ///
    /// The returned batches borrow `self` but not `filter` or `selection`.
    fn scan<'a>(&'a self, filter: &RowFilter, selection: &MetricSelection)
    -> Result<ScanBatches<'a>>;
}
