use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use gridcast_catalog::layout::BASE_COLUMNS;
use gridcast_catalog::{MetricSelection, SourceSide};
use gridcast_join::LeftJoinIndex;
use gridcast_result::Result;
use gridcast_scan::{RowFilter, ScanBatches};
use gridcast_storage::ColumnTable;

use crate::options::JoinStrategy;
use crate::strategy::JoinedTable;

/// Keeps the two tables apart and joins per query.
///
/// Each scan narrows the primary batches to the base columns plus the
/// selected primary sources, filters them, and only then gathers the
/// selected secondary columns through the shared key index. A selection
/// without secondary sources never touches the index.
#[derive(Debug)]
pub struct LazyJoin {
    primary: ColumnTable,
    index: LeftJoinIndex,
    schema: SchemaRef,
}

impl LazyJoin {
    pub fn new(primary: ColumnTable, index: LeftJoinIndex) -> Result<Self> {
        let all_payload = payload_columns(&index);
        let payload = index.payload_indices(&all_payload)?;
        // Surfaces name collisions at construction instead of per query.
        let schema = index.output_schema(&primary.schema(), &payload)?;
        tracing::debug!(
            primary_rows = primary.num_rows(),
            secondary_columns = payload.len(),
            "prepared lazy join"
        );
        Ok(Self {
            primary,
            index,
            schema,
        })
    }

    fn primary_projection(&self, selection: &MetricSelection) -> Result<Vec<usize>> {
        let mut indices = BASE_COLUMNS
            .iter()
            .map(|(name, _)| self.primary.column_index(name))
            .collect::<Result<Vec<_>>>()?;
        for name in selection.source_columns(SourceSide::Primary) {
            let idx = self.primary.column_index(&name)?;
            if !indices.contains(&idx) {
                indices.push(idx);
            }
        }
        Ok(indices)
    }
}

fn payload_columns(index: &LeftJoinIndex) -> Vec<String> {
    index
        .right_schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .filter(|name| !index.keys().iter().any(|k| &k.right_column == name))
        .collect()
}

impl JoinedTable for LazyJoin {
    fn strategy(&self) -> JoinStrategy {
        JoinStrategy::Lazy
    }

    fn num_rows(&self) -> usize {
        self.primary.num_rows()
    }

    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn scan<'a>(
        &'a self,
        filter: &RowFilter,
        selection: &MetricSelection,
    ) -> Result<ScanBatches<'a>> {
        let projection = self.primary_projection(selection)?;
        let narrowed_schema: SchemaRef = Arc::new(self.primary.schema().project(&projection)?);
        filter.bind(&narrowed_schema)?;

        let join = selection.needs_secondary();
        let (payload, output_schema) = if join {
            let secondary = selection.source_columns(SourceSide::Secondary);
            let payload = self.index.payload_indices(&secondary)?;
            let schema = self.index.output_schema(&narrowed_schema, &payload)?;
            (payload, schema)
        } else {
            (Vec::new(), Arc::clone(&narrowed_schema))
        };

        tracing::trace!(
            primary_columns = projection.len(),
            secondary_columns = payload.len(),
            "lazy scan"
        );

        if filter.matches_nothing() {
            return Ok(ScanBatches::empty(output_schema));
        }

        let filter = filter.clone();
        let bound_schema = Arc::clone(&narrowed_schema);
        let filtered = self
            .primary
            .batches()
            .iter()
            .map(move |batch| -> Result<RecordBatch> {
                let narrowed = batch.project(&projection)?;
                filter.bind(&bound_schema)?.apply(narrowed)
            })
            .filter(|res| !matches!(res, Ok(batch) if batch.num_rows() == 0));

        if !join {
            return Ok(ScanBatches::new(output_schema, filtered));
        }
        let joined = self
            .index
            .join_stream(&narrowed_schema, filtered, payload)?;
        Ok(ScanBatches::new(output_schema, joined))
    }
}
