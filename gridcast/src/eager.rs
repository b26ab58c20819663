use std::sync::Arc;
use std::time::Instant;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use gridcast_catalog::MetricSelection;
use gridcast_join::LeftJoinIndex;
use gridcast_result::Result;
use gridcast_scan::{RowFilter, ScanBatches};
use gridcast_storage::ColumnTable;

use crate::options::JoinStrategy;
use crate::strategy::JoinedTable;

/// Joins every primary row with its secondary row once, at construction.
///
/// Queries only filter the stored batches; the selection never changes what
/// is read because every secondary column is already in place.
#[derive(Debug)]
pub struct EagerJoin {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    num_rows: usize,
}

impl EagerJoin {
    pub fn new(primary: &ColumnTable, index: &LeftJoinIndex) -> Result<Self> {
        let started = Instant::now();
        let payload_names: Vec<String> = index
            .right_schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .filter(|name| !index.keys().iter().any(|k| &k.right_column == name))
            .collect();
        let payload = index.payload_indices(&payload_names)?;

        let stream = index.join_stream(
            &primary.schema(),
            primary.batches().iter().cloned().map(Ok),
            payload,
        )?;
        let schema = stream.schema();
        let batches = stream.collect::<Result<Vec<_>>>()?;
        let num_rows = batches.iter().map(RecordBatch::num_rows).sum();

        tracing::info!(
            rows = num_rows,
            columns = schema.fields().len(),
            batches = batches.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "materialized eager join"
        );

        Ok(Self {
            schema,
            batches,
            num_rows,
        })
    }
}

impl JoinedTable for EagerJoin {
    fn strategy(&self) -> JoinStrategy {
        JoinStrategy::Eager
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn scan<'a>(
        &'a self,
        filter: &RowFilter,
        _selection: &MetricSelection,
    ) -> Result<ScanBatches<'a>> {
        let schema = self.schema();
        // Bind once up front so a bad filter fails before the first row.
        filter.bind(&schema)?;
        if filter.matches_nothing() {
            return Ok(ScanBatches::empty(schema));
        }
        if filter.is_unconstrained() {
            return Ok(ScanBatches::new(
                schema,
                self.batches.iter().cloned().map(Ok),
            ));
        }

        let filter = filter.clone();
        let bound_schema = Arc::clone(&schema);
        let batches = self
            .batches
            .iter()
            .map(move |batch| -> Result<RecordBatch> {
                filter.bind(&bound_schema)?.apply(batch.clone())
            });
        Ok(ScanBatches::new(schema, batches))
    }
}
