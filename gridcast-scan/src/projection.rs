//! Metric projection from joined batches to records.

use std::sync::Arc;

use arrow::array::{
    Array, AsArray, Float32Array, Float64Array, Int64Array, ListArray, RecordBatch,
};
use arrow::datatypes::{Float32Type, Int64Type, Schema};
use gridcast_catalog::layout::{
    CELL_ID, GRID_COL, GRID_ROW, LATITUDE, LONGITUDE, PERIOD_ID, REGION_ID,
};
use gridcast_catalog::{MetricSelection, MetricSource, MetricType, mean_of_list_columns};
use gridcast_result::{Error, Result};

use crate::record::{ForecastRecord, MetricValue, MetricValues};

#[derive(Clone, Debug)]
enum MetricPlan {
    Float32(usize),
    Float32List(usize),
    Mean(Vec<usize>),
}

#[derive(Clone, Copy, Debug)]
struct BaseColumns {
    cell: usize,
    period: usize,
    region: usize,
    row: usize,
    col: usize,
    lat: usize,
    lon: usize,
}

/// Turns joined batches into [`ForecastRecord`]s carrying exactly the
/// selected metrics.
///
/// Bound to one batch schema. Derived metrics are computed per batch, and
/// only when selected.
#[derive(Clone, Debug)]
pub struct MetricProjector {
    names: Vec<Arc<str>>,
    plans: Vec<MetricPlan>,
    base: BaseColumns,
}

impl MetricProjector {
    /// Resolve the base columns and every selected metric's sources in
    /// `schema`.
    pub fn bind(selection: &MetricSelection, schema: &Schema) -> Result<Self> {
        let index = |name: &str| {
            schema
                .index_of(name)
                .map_err(|_| Error::Internal(format!("column '{name}' missing from scan output")))
        };
        let base = BaseColumns {
            cell: index(CELL_ID)?,
            period: index(PERIOD_ID)?,
            region: index(REGION_ID)?,
            row: index(GRID_ROW)?,
            col: index(GRID_COL)?,
            lat: index(LATITUDE)?,
            lon: index(LONGITUDE)?,
        };

        let mut names = Vec::with_capacity(selection.len());
        let mut plans = Vec::with_capacity(selection.len());
        for metric in selection.metrics() {
            let plan = match (metric.metric_type(), metric.source()) {
                (MetricType::Float32, MetricSource::Column(c)) => {
                    MetricPlan::Float32(index(c.name.as_ref())?)
                }
                (MetricType::Float32List, MetricSource::Column(c)) => {
                    MetricPlan::Float32List(index(c.name.as_ref())?)
                }
                (MetricType::DerivedMean, MetricSource::MeanOf(columns)) => MetricPlan::Mean(
                    columns
                        .iter()
                        .map(|c| index(c.name.as_ref()))
                        .collect::<Result<Vec<_>>>()?,
                ),
                (ty, _) => {
                    return Err(Error::Internal(format!(
                        "metric '{}' of type {ty} has a mismatched source",
                        metric.name()
                    )));
                }
            };
            names.push(Arc::clone(metric.name_arc()));
            plans.push(plan);
        }

        Ok(Self { names, plans, base })
    }

    /// Selected metric names, in output order.
    pub fn metric_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.iter().map(AsRef::as_ref)
    }

    /// Decode one batch into typed columns ready for per-row extraction.
    pub fn project(&self, batch: &RecordBatch) -> Result<ProjectedBatch> {
        let metrics = self
            .plans
            .iter()
            .map(|plan| match plan {
                MetricPlan::Float32(idx) => Ok(ProjectedColumn::Float32(float32(batch, *idx)?)),
                MetricPlan::Float32List(idx) => {
                    let list = list(batch, *idx)?;
                    let values = list_values(list)?;
                    Ok(ProjectedColumn::Float32List {
                        list: list.clone(),
                        values,
                    })
                }
                MetricPlan::Mean(indices) => {
                    let lists = indices
                        .iter()
                        .map(|&idx| list(batch, idx))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(ProjectedColumn::Float64(mean_of_list_columns(&lists)?))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ProjectedBatch {
            names: self.names.clone(),
            cell: int64(batch, self.base.cell)?,
            period: int64(batch, self.base.period)?,
            region: int64(batch, self.base.region)?,
            row: int64(batch, self.base.row)?,
            col: int64(batch, self.base.col)?,
            lat: float32(batch, self.base.lat)?,
            lon: float32(batch, self.base.lon)?,
            metrics,
        })
    }
}

#[derive(Debug)]
enum ProjectedColumn {
    Float32(Float32Array),
    Float64(Float64Array),
    Float32List { list: ListArray, values: Float32Array },
}

impl ProjectedColumn {
    fn value(&self, row: usize) -> Option<MetricValue> {
        match self {
            ProjectedColumn::Float32(a) => a.is_valid(row).then(|| MetricValue::Float32(a.value(row))),
            ProjectedColumn::Float64(a) => a.is_valid(row).then(|| MetricValue::Float64(a.value(row))),
            ProjectedColumn::Float32List { list, values } => list.is_valid(row).then(|| {
                let offsets = list.value_offsets();
                let (start, end) = (offsets[row] as usize, offsets[row + 1] as usize);
                MetricValue::Float32List(
                    (start..end)
                        .map(|i| values.is_valid(i).then(|| values.value(i)))
                        .collect(),
                )
            }),
        }
    }
}

/// One batch decoded by [`MetricProjector::project`].
#[derive(Debug)]
pub struct ProjectedBatch {
    names: Vec<Arc<str>>,
    cell: Int64Array,
    period: Int64Array,
    region: Int64Array,
    row: Int64Array,
    col: Int64Array,
    lat: Float32Array,
    lon: Float32Array,
    metrics: Vec<ProjectedColumn>,
}

impl ProjectedBatch {
    pub fn num_rows(&self) -> usize {
        self.cell.len()
    }

    /// Materialize row `row` as a record.
    ///
    /// Fails if the row's composite key is null.
    pub fn record(&self, row: usize) -> Result<ForecastRecord> {
        let (Some(cell_id), Some(period_id)) = (opt(&self.cell, row), opt(&self.period, row))
        else {
            return Err(Error::Internal(format!("row {row} has a null composite key")));
        };

        let mut metrics = MetricValues::with_capacity(self.metrics.len());
        for (name, column) in self.names.iter().zip(&self.metrics) {
            metrics.push(Arc::clone(name), column.value(row));
        }

        Ok(ForecastRecord {
            cell_id,
            period_id,
            region: opt(&self.region, row),
            lat: opt_f32(&self.lat, row),
            lon: opt_f32(&self.lon, row),
            row: opt(&self.row, row),
            col: opt(&self.col, row),
            metrics,
        })
    }
}

fn opt(array: &Int64Array, row: usize) -> Option<i64> {
    array.is_valid(row).then(|| array.value(row))
}

fn opt_f32(array: &Float32Array, row: usize) -> Option<f32> {
    array.is_valid(row).then(|| array.value(row))
}

fn int64(batch: &RecordBatch, idx: usize) -> Result<Int64Array> {
    batch
        .column(idx)
        .as_primitive_opt::<Int64Type>()
        .cloned()
        .ok_or_else(|| type_error(batch, idx, "Int64"))
}

fn float32(batch: &RecordBatch, idx: usize) -> Result<Float32Array> {
    batch
        .column(idx)
        .as_primitive_opt::<Float32Type>()
        .cloned()
        .ok_or_else(|| type_error(batch, idx, "Float32"))
}

fn list(batch: &RecordBatch, idx: usize) -> Result<&ListArray> {
    batch
        .column(idx)
        .as_list_opt::<i32>()
        .ok_or_else(|| type_error(batch, idx, "List<Float32>"))
}

fn list_values(list: &ListArray) -> Result<Float32Array> {
    list.values()
        .as_primitive_opt::<Float32Type>()
        .cloned()
        .ok_or_else(|| {
            Error::Internal(format!(
                "list column has item type {}, expected Float32",
                list.value_type()
            ))
        })
}

fn type_error(batch: &RecordBatch, idx: usize, expected: &str) -> Error {
    let schema = batch.schema_ref();
    let field = schema.field(idx);
    Error::Internal(format!(
        "column '{}' has type {}, expected {expected}",
        field.name(),
        field.data_type()
    ))
}
