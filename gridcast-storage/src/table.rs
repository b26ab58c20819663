//! Immutable in-memory column tables.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{Field, Int64Type, Schema, SchemaRef};
use gridcast_result::{Error, Result};

use crate::types::{ColumnSpec, ColumnType};

/// A named, immutable, batch-backed column table.
///
/// Every column carries one of the [`ColumnType`]s, all batches share the
/// table schema, and the row count never changes after construction. Clones
/// share the underlying buffers.
#[derive(Clone, Debug)]
pub struct ColumnTable {
    name: Arc<str>,
    schema: SchemaRef,
    column_types: Arc<[ColumnType]>,
    batches: Arc<[RecordBatch]>,
    num_rows: usize,
}

impl ColumnTable {
    /// Build a table from batches that already use canonical column types.
    ///
    /// Fails with [`Error::LoadError`] when the table is empty, when a batch
    /// schema differs from `schema`, or when a column type is outside the model.
    pub fn try_new(
        name: impl Into<Arc<str>>,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<Self> {
        let name = name.into();
        let mut column_types = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            match ColumnType::classify(field.data_type()) {
                Some(ty) if &ty.data_type() == field.data_type() => column_types.push(ty),
                _ => {
                    return Err(Error::LoadError(format!(
                        "{name}: column '{}' has unsupported type {}",
                        field.name(),
                        field.data_type()
                    )));
                }
            }
        }

        for batch in &batches {
            if batch.schema().fields() != schema.fields() {
                return Err(Error::LoadError(format!(
                    "{name}: batch schema does not match table schema"
                )));
            }
        }

        let num_rows = batches.iter().map(RecordBatch::num_rows).sum();
        if num_rows == 0 {
            return Err(Error::LoadError(format!("{name}: table is empty")));
        }

        Ok(Self {
            name,
            schema,
            column_types: column_types.into(),
            batches: batches.into(),
            num_rows,
        })
    }

    /// Build a table from raw batches, casting each declared column to its
    /// canonical type and dropping undeclared columns.
    ///
    /// Every spec must be present in the batch schema; all missing names are
    /// reported in one [`Error::LoadError`].
    pub fn from_raw_batches(
        name: impl Into<Arc<str>>,
        source_schema: &Schema,
        specs: &[ColumnSpec],
        batches: Vec<RecordBatch>,
    ) -> Result<Self> {
        let name = name.into();
        let indices = resolve_specs(&name, source_schema, specs)?;
        let schema: SchemaRef = Arc::new(Schema::new(
            specs.iter().map(ColumnSpec::field).collect::<Vec<Field>>(),
        ));

        let mut canonical = Vec::with_capacity(batches.len());
        for batch in batches {
            let mut columns = Vec::with_capacity(specs.len());
            for (spec, &idx) in specs.iter().zip(&indices) {
                columns.push(canonicalize(&name, spec, batch.column(idx))?);
            }
            canonical.push(RecordBatch::try_new(Arc::clone(&schema), columns)?);
        }

        Self::try_new(name, schema, canonical)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.schema.fields().iter().map(|f| f.name().as_str())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.schema.index_of(column).is_ok()
    }

    /// Position of `column` in the schema.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.schema.index_of(column).map_err(|_| {
            Error::InvalidArgumentError(format!("{}: unknown column '{column}'", self.name))
        })
    }

    /// Semantic type of `column`.
    pub fn column_type(&self, column: &str) -> Result<ColumnType> {
        let idx = self.column_index(column)?;
        Ok(self.column_types[idx])
    }

    /// Fail with one [`Error::LoadError`] naming every absent column.
    pub fn require_columns<S: AsRef<str>>(&self, columns: &[S]) -> Result<()> {
        let missing: Vec<&str> = columns
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| !self.has_column(c))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::LoadError(format!(
                "{}: missing required columns: {}",
                self.name,
                missing.join(", ")
            )))
        }
    }

    /// Narrow the table to `columns`, in the given order.
    ///
    /// Shares buffers with `self`; no values are copied.
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Result<ColumnTable> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let schema = Arc::new(self.schema.project(&indices)?);
        let batches = self
            .batches
            .iter()
            .map(|b| b.project(&indices))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            name: Arc::clone(&self.name),
            schema,
            column_types: indices.iter().map(|&i| self.column_types[i]).collect(),
            batches: batches.into(),
            num_rows: self.num_rows,
        })
    }

    /// Iterate the non-null values of an `Int64` column in row order.
    pub fn int64_values<'a>(&'a self, column: &str) -> Result<impl Iterator<Item = i64> + 'a> {
        let idx = self.column_index(column)?;
        if self.column_types[idx] != ColumnType::Int64 {
            return Err(Error::InvalidArgumentError(format!(
                "{}: column '{column}' is not int64",
                self.name
            )));
        }
        Ok(self.batches.iter().flat_map(move |batch| {
            batch
                .column(idx)
                .as_primitive::<Int64Type>()
                .iter()
                .flatten()
                .collect::<Vec<_>>()
        }))
    }
}

fn resolve_specs(name: &str, schema: &Schema, specs: &[ColumnSpec]) -> Result<Vec<usize>> {
    let mut indices = Vec::with_capacity(specs.len());
    let mut missing = Vec::new();
    for spec in specs {
        match schema.index_of(&spec.name) {
            Ok(idx) => indices.push(idx),
            Err(_) => missing.push(spec.name.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(Error::LoadError(format!(
            "{name}: missing required columns: {}",
            missing.join(", ")
        )));
    }
    Ok(indices)
}

fn canonicalize(name: &str, spec: &ColumnSpec, column: &ArrayRef) -> Result<ArrayRef> {
    let found = ColumnType::classify(column.data_type());
    if found != Some(spec.column_type) {
        return Err(Error::LoadError(format!(
            "{name}: column '{}' has type {}, expected {}",
            spec.name,
            column.data_type(),
            spec.column_type
        )));
    }
    let target = spec.column_type.data_type();
    if column.data_type() == &target {
        return Ok(Arc::clone(column));
    }
    cast(column.as_ref(), &target)
        .map_err(|e| Error::load(format!("{name}: casting column '{}'", spec.name), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int32Array, Int64Array, StringArray};
    use arrow::datatypes::DataType;

    fn raw_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("month_id", DataType::Int32, false),
            Field::new("lat", DataType::Float64, true),
            Field::new("note", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![409, 410])),
                Arc::new(Float64Array::from(vec![Some(1.5), None])),
                Arc::new(StringArray::from(vec!["a", "b"])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn raw_batches_are_canonicalized() {
        let batch = raw_batch();
        let specs = [ColumnSpec::int64("month_id"), ColumnSpec::float32("lat")];
        let table =
            ColumnTable::from_raw_batches("primary", &batch.schema(), &specs, vec![batch]).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.column_type("month_id").unwrap(), ColumnType::Int64);
        assert_eq!(
            table.batches()[0].column(1).data_type(),
            &DataType::Float32
        );
        assert!(!table.has_column("note"));
        let months: Vec<i64> = table.int64_values("month_id").unwrap().collect();
        assert_eq!(months, vec![409, 410]);
    }

    #[test]
    fn missing_columns_are_reported_together() {
        let batch = raw_batch();
        let specs = [
            ColumnSpec::int64("priogrid_id"),
            ColumnSpec::int64("month_id"),
            ColumnSpec::float32("lon"),
        ];
        let err = ColumnTable::from_raw_batches("primary", &batch.schema(), &specs, vec![batch])
            .unwrap_err();
        match err {
            Error::LoadError(msg) => {
                assert!(msg.contains("priogrid_id"), "{msg}");
                assert!(msg.contains("lon"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn mistyped_column_is_a_load_error() {
        let batch = raw_batch();
        let specs = [ColumnSpec::int64("note")];
        let err = ColumnTable::from_raw_batches("primary", &batch.schema(), &specs, vec![batch])
            .unwrap_err();
        assert!(matches!(err, Error::LoadError(msg) if msg.contains("'note'")));
    }

    #[test]
    fn empty_table_is_rejected() {
        let schema = Arc::new(Schema::new(vec![Field::new("month_id", DataType::Int64, true)]));
        let empty = RecordBatch::new_empty(Arc::clone(&schema));
        let err = ColumnTable::try_new("secondary", schema, vec![empty]).unwrap_err();
        assert!(matches!(err, Error::LoadError(msg) if msg.contains("empty")));
    }

    #[test]
    fn projection_shares_rows_and_orders_columns() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(Int64Array::from(vec![4, 5, 6])),
            ],
        )
        .unwrap();
        let table = ColumnTable::try_new("t", schema, vec![batch]).unwrap();

        let narrowed = table.project(&["b"]).unwrap();
        assert_eq!(narrowed.num_rows(), 3);
        assert_eq!(narrowed.column_names().collect::<Vec<_>>(), vec!["b"]);
        assert!(table.project(&["c"]).is_err());
        assert!(table.require_columns(&["a", "b"]).is_ok());
        assert!(matches!(
            table.require_columns(&["a", "x", "y"]),
            Err(Error::LoadError(msg)) if msg.contains("x, y")
        ));
    }
}
