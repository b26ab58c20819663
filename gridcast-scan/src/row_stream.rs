use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use gridcast_result::Result;

use crate::projection::{MetricProjector, ProjectedBatch};
use crate::record::ForecastRecord;

/// Boxed, sendable iterator of filtered (and, for the lazy strategy, freshly
/// joined) batches.
pub type BatchIter<'a> = Box<dyn Iterator<Item = Result<RecordBatch>> + Send + 'a>;

/// Output of a strategy scan: the batch schema plus the batches themselves.
pub struct ScanBatches<'a> {
    pub schema: SchemaRef,
    pub batches: BatchIter<'a>,
}

impl<'a> ScanBatches<'a> {
    pub fn new<I>(schema: SchemaRef, batches: I) -> Self
    where
        I: Iterator<Item = Result<RecordBatch>> + Send + 'a,
    {
        Self {
            schema,
            batches: Box::new(batches),
        }
    }

    /// A scan with no batches.
    pub fn empty(schema: SchemaRef) -> Self {
        Self::new(schema, std::iter::empty())
    }
}

/// Lazy, single-pass stream of [`ForecastRecord`]s.
///
/// Pulls one batch at a time, projects it, and yields its rows in order.
/// Dropping the stream releases the batch in flight. After an error the
/// stream is exhausted.
pub struct RecordStream<'a> {
    schema: SchemaRef,
    batches: BatchIter<'a>,
    projector: MetricProjector,
    current: Option<ProjectedBatch>,
    next_row: usize,
    finished: bool,
}

impl<'a> RecordStream<'a> {
    pub fn new(scan: ScanBatches<'a>, projector: MetricProjector) -> Self {
        Self {
            schema: scan.schema,
            batches: scan.batches,
            projector,
            current: None,
            next_row: 0,
            finished: false,
        }
    }

    /// Schema of the batches behind the stream.
    pub fn schema(&self) -> SchemaRef {
        SchemaRef::clone(&self.schema)
    }

    /// Metric names every record carries, in order.
    pub fn metric_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.projector.metric_names()
    }

    fn fail<T>(&mut self, err: gridcast_result::Error) -> Option<Result<T>> {
        self.finished = true;
        self.current = None;
        Some(Err(err))
    }
}

impl Iterator for RecordStream<'_> {
    type Item = Result<ForecastRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = &self.current {
                if self.next_row < current.num_rows() {
                    let row = self.next_row;
                    self.next_row += 1;
                    return match current.record(row) {
                        Ok(record) => Some(Ok(record)),
                        Err(e) => self.fail(e),
                    };
                }
                self.current = None;
            }
            if self.finished {
                return None;
            }

            match self.batches.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Err(e)) => return self.fail(e),
                Some(Ok(batch)) if batch.num_rows() == 0 => continue,
                Some(Ok(batch)) => match self.projector.project(&batch) {
                    Ok(projected) => {
                        tracing::trace!(rows = projected.num_rows(), "projected batch");
                        self.current = Some(projected);
                        self.next_row = 0;
                    }
                    Err(e) => return self.fail(e),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float32Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use gridcast_catalog::MetricCatalog;
    use gridcast_catalog::layout::BASE_COLUMNS;
    use gridcast_result::Error;
    use std::sync::Arc;

    fn base_schema() -> SchemaRef {
        Arc::new(Schema::new(
            BASE_COLUMNS
                .iter()
                .map(|(name, ty)| Field::new(*name, ty.data_type(), true))
                .collect::<Vec<_>>(),
        ))
    }

    fn base_batch(cells: Vec<i64>) -> RecordBatch {
        let n = cells.len();
        let int = |v: Vec<i64>| Arc::new(Int64Array::from(v)) as ArrayRef;
        RecordBatch::try_new(
            base_schema(),
            vec![
                int(cells),
                int(vec![409; n]),
                int(vec![1; n]),
                int(vec![0; n]),
                int(vec![0; n]),
                Arc::new(Float32Array::from(vec![0.0; n])),
                Arc::new(Float32Array::from(vec![0.0; n])),
            ],
        )
        .unwrap()
    }

    fn projector() -> MetricProjector {
        let selection = MetricCatalog::summary()
            .resolve(Some(&[] as &[&str]))
            .unwrap();
        MetricProjector::bind(&selection, &base_schema()).unwrap()
    }

    #[test]
    fn streams_rows_across_batches_and_skips_empty_ones() {
        let batches = vec![
            Ok(base_batch(vec![1, 2])),
            Ok(base_batch(vec![])),
            Ok(base_batch(vec![3])),
        ];
        let stream = RecordStream::new(ScanBatches::new(base_schema(), batches.into_iter()), projector());
        let cells: Vec<i64> = stream.map(|r| r.unwrap().cell_id).collect();
        assert_eq!(cells, vec![1, 2, 3]);
    }

    #[test]
    fn stream_ends_after_an_error() {
        let batches = vec![
            Ok(base_batch(vec![1])),
            Err(Error::Internal("boom".into())),
            Ok(base_batch(vec![2])),
        ];
        let mut stream =
            RecordStream::new(ScanBatches::new(base_schema(), batches.into_iter()), projector());
        assert_eq!(stream.next().unwrap().unwrap().cell_id, 1);
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
    }

    #[test]
    fn empty_scan_yields_nothing() {
        let mut stream = RecordStream::new(ScanBatches::empty(base_schema()), projector());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
        assert_eq!(stream.metric_names().count(), 0);
    }
}
