use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch};
use arrow::compute::{concat_batches, take};
use arrow::datatypes::{Field, FieldRef, Schema, SchemaRef};
use gridcast_result::{Error, Result};
use gridcast_storage::ColumnTable;
use rustc_hash::FxHashSet;

use crate::index::KeyIndex;
use crate::{DuplicateKeyPolicy, JoinKey, JoinOptions, validate_join_keys};

/// Build side of a left outer join.
///
/// Holds the right table as one contiguous batch plus a [`KeyIndex`] over its
/// key columns. Built once and shared read-only by every probe; a probe can
/// gather any subset of the right columns ("payload") without rebuilding the
/// index.
#[derive(Debug)]
pub struct LeftJoinIndex {
    keys: Vec<JoinKey>,
    right: RecordBatch,
    index: KeyIndex,
}

impl LeftJoinIndex {
    /// Index `right` on the right-hand columns of `keys`.
    pub fn build(right: &ColumnTable, keys: &[JoinKey], options: &JoinOptions) -> Result<Self> {
        validate_join_keys(keys)?;

        let right_key_columns = keys
            .iter()
            .map(|k| k.right_column.as_str())
            .collect::<Vec<_>>();
        right.require_columns(&right_key_columns)?;

        let batch = concat_batches(&right.schema(), right.batches())?;
        let key_arrays = key_columns(&batch, keys.iter().map(|k| k.right_column.as_str()))?;
        let index = KeyIndex::build(right.name(), &key_arrays, options.duplicate_keys)?;

        tracing::debug!(
            table = right.name(),
            rows = batch.num_rows(),
            keys = index.len(),
            duplicates = index.duplicates(),
            "built join index"
        );

        Ok(Self {
            keys: keys.to_vec(),
            right: batch,
            index,
        })
    }

    pub fn keys(&self) -> &[JoinKey] {
        &self.keys
    }

    pub fn right_schema(&self) -> SchemaRef {
        self.right.schema()
    }

    pub fn key_index(&self) -> &KeyIndex {
        &self.index
    }

    /// Resolve right-hand column names to payload positions.
    pub fn payload_indices<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<usize>> {
        let schema = self.right.schema();
        columns
            .iter()
            .map(|c| {
                schema.index_of(c.as_ref()).map_err(|_| {
                    Error::InvalidArgumentError(format!(
                        "unknown join payload column '{}'",
                        c.as_ref()
                    ))
                })
            })
            .collect()
    }

    /// Schema of [`join_batch`](Self::join_batch) output: every left column
    /// followed by the payload columns, the latter nullable.
    pub fn output_schema(&self, left: &Schema, payload: &[usize]) -> Result<SchemaRef> {
        let right_schema = self.right.schema();
        let mut names: FxHashSet<&str> = left.fields().iter().map(|f| f.name().as_str()).collect();
        let mut fields: Vec<FieldRef> = left.fields().iter().cloned().collect();
        for &idx in payload {
            let field = right_schema.fields().get(idx).ok_or_else(|| {
                Error::Internal(format!("join payload index {idx} out of range"))
            })?;
            if !names.insert(field.name().as_str()) {
                return Err(Error::InvalidArgumentError(format!(
                    "join output would contain column '{}' twice",
                    field.name()
                )));
            }
            fields.push(Arc::new(Field::new(
                field.name(),
                field.data_type().clone(),
                true,
            )));
        }
        Ok(Arc::new(Schema::new(fields)))
    }

    /// Left-join one batch: every left row appears once, in order, followed
    /// by the matching right row's payload columns (null when unmatched).
    pub fn join_batch(
        &self,
        left: &RecordBatch,
        payload: &[usize],
        schema: &SchemaRef,
    ) -> Result<RecordBatch> {
        let probe_keys = key_columns(left, self.keys.iter().map(|k| k.left_column.as_str()))?;
        let matches = self.index.probe(&probe_keys)?;

        let mut columns: Vec<ArrayRef> = left.columns().to_vec();
        for &idx in payload {
            columns.push(take(self.right.column(idx).as_ref(), &matches, None)?);
        }
        Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
    }

    /// Stream the left join of `left` batches, one output batch per input.
    pub fn join_stream<'a, I>(
        &'a self,
        left_schema: &Schema,
        left: I,
        payload: Vec<usize>,
    ) -> Result<LeftJoinStream<'a, I>>
    where
        I: Iterator<Item = Result<RecordBatch>>,
    {
        let schema = self.output_schema(left_schema, &payload)?;
        Ok(LeftJoinStream {
            index: self,
            schema,
            left,
            payload,
        })
    }
}

/// Iterator adapter produced by [`LeftJoinIndex::join_stream`].
pub struct LeftJoinStream<'a, I> {
    index: &'a LeftJoinIndex,
    schema: SchemaRef,
    left: I,
    payload: Vec<usize>,
}

impl<I> LeftJoinStream<'_, I> {
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }
}

impl<I> Iterator for LeftJoinStream<'_, I>
where
    I: Iterator<Item = Result<RecordBatch>>,
{
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = match self.left.next()? {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };
        Some(self.index.join_batch(&batch, &self.payload, &self.schema))
    }
}

/// Fail with [`Error::LoadError`] if two rows of `table` share a key or any
/// row has a null key component.
pub fn ensure_unique_keys<S: AsRef<str>>(table: &ColumnTable, key_names: &[S]) -> Result<()> {
    let names: Vec<&str> = key_names.iter().map(AsRef::as_ref).collect();
    table.require_columns(&names)?;
    let keys_only = table.project(&names)?;
    let batch = concat_batches(&keys_only.schema(), keys_only.batches())?;
    let index = KeyIndex::build(table.name(), batch.columns(), DuplicateKeyPolicy::Reject)?;
    if index.null_keys() > 0 {
        return Err(Error::LoadError(format!(
            "{}: {} rows have a null key ({})",
            table.name(),
            index.null_keys(),
            names.join(", ")
        )));
    }
    Ok(())
}

fn key_columns<'s>(
    batch: &RecordBatch,
    names: impl Iterator<Item = &'s str>,
) -> Result<Vec<ArrayRef>> {
    names
        .map(|name| {
            batch
                .schema_ref()
                .index_of(name)
                .map(|idx| Arc::clone(batch.column(idx)))
                .map_err(|_| Error::InvalidArgumentError(format!("missing join key column '{name}'")))
        })
        .collect()
}
