//! Read-only views over the key and location columns of the primary table.

use std::collections::{BTreeMap, BTreeSet};

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::datatypes::{Float32Type, Int64Type};
use gridcast_catalog::layout::{CELL_ID, GRID_COL, GRID_ROW, LATITUDE, LONGITUDE, REGION_ID};
use gridcast_result::{Error, Result};
use gridcast_storage::ColumnTable;
use serde::Serialize;

/// Where a cell sits on the grid, as recorded on its first primary row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellLocation {
    #[serde(rename = "priogrid_id")]
    pub cell_id: i64,
    pub row: Option<i64>,
    pub col: Option<i64>,
    #[serde(rename = "country_id")]
    pub region: Option<i64>,
    pub lat: Option<f32>,
    pub lon: Option<f32>,
}

/// Sorted, deduplicated non-null values of an `Int64` column.
pub(crate) fn distinct_values(table: &ColumnTable, column: &str) -> Result<Vec<i64>> {
    let values: BTreeSet<i64> = table.int64_values(column)?.collect();
    Ok(values.into_iter().collect())
}

/// One location per distinct cell, ordered by cell id.
pub(crate) fn cell_locations(table: &ColumnTable) -> Result<Vec<CellLocation>> {
    let mut locations: BTreeMap<i64, CellLocation> = BTreeMap::new();
    for batch in table.batches() {
        let cells = int64_column(batch, CELL_ID)?;
        let rows = int64_column(batch, GRID_ROW)?;
        let cols = int64_column(batch, GRID_COL)?;
        let regions = int64_column(batch, REGION_ID)?;
        let lats = float32_column(batch, LATITUDE)?;
        let lons = float32_column(batch, LONGITUDE)?;

        for i in 0..batch.num_rows() {
            if cells.is_null(i) {
                continue;
            }
            let cell_id = cells.value(i);
            locations.entry(cell_id).or_insert_with(|| CellLocation {
                cell_id,
                row: rows.is_valid(i).then(|| rows.value(i)),
                col: cols.is_valid(i).then(|| cols.value(i)),
                region: regions.is_valid(i).then(|| regions.value(i)),
                lat: lats.is_valid(i).then(|| lats.value(i)),
                lon: lons.is_valid(i).then(|| lons.value(i)),
            });
        }
    }
    Ok(locations.into_values().collect())
}

fn column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b dyn Array> {
    batch
        .column_by_name(name)
        .map(|c| c.as_ref())
        .ok_or_else(|| Error::Internal(format!("primary table lost column '{name}'")))
}

fn int64_column<'b>(
    batch: &'b RecordBatch,
    name: &str,
) -> Result<&'b arrow::array::PrimitiveArray<Int64Type>> {
    column(batch, name)?
        .as_primitive_opt::<Int64Type>()
        .ok_or_else(|| Error::Internal(format!("column '{name}' is not int64")))
}

fn float32_column<'b>(
    batch: &'b RecordBatch,
    name: &str,
) -> Result<&'b arrow::array::PrimitiveArray<Float32Type>> {
    column(batch, name)?
        .as_primitive_opt::<Float32Type>()
        .ok_or_else(|| Error::Internal(format!("column '{name}' is not float32")))
}
