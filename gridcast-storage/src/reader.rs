//! Parquet source reading.

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use arrow::record_batch::{RecordBatch, RecordBatchReader};
use gridcast_result::{Error, Result};
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::LoadOptions;
use crate::table::ColumnTable;
use crate::types::ColumnSpec;

/// Load the declared columns of a Parquet file into a [`ColumnTable`].
///
/// Only the declared root columns are decoded. Every failure (missing file,
/// corrupt footer, missing or mistyped column, empty table) surfaces as
/// [`Error::LoadError`].
pub fn load_parquet_table(
    name: &str,
    path: &Path,
    specs: &[ColumnSpec],
    options: &LoadOptions,
) -> Result<ColumnTable> {
    options.validate()?;
    let started = Instant::now();

    let file = File::open(path)
        .map_err(|e| Error::load(format!("{name} ({})", path.display()), e))?;
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
        Error::load(
            format!("{name}: failed to open Parquet reader for {}", path.display()),
            e,
        )
    })?;

    // Resolve against the full file schema first so missing columns are
    // reported by name rather than silently skipped by the mask.
    let file_schema = builder.schema().clone();
    let mut roots = Vec::with_capacity(specs.len());
    let mut missing = Vec::new();
    for spec in specs {
        match file_schema.index_of(&spec.name) {
            Ok(idx) => roots.push(idx),
            Err(_) => missing.push(spec.name.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(Error::LoadError(format!(
            "{name}: missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mask = ProjectionMask::roots(builder.parquet_schema(), roots.iter().copied());
    builder = builder
        .with_projection(mask)
        .with_batch_size(options.batch_size);

    let reader = builder
        .build()
        .map_err(|e| Error::load(format!("{name}: failed to build Parquet reader"), e))?;
    let projected_schema = reader.schema();

    let mut batches: Vec<RecordBatch> = Vec::new();
    for batch in reader {
        let batch =
            batch.map_err(|e| Error::load(format!("{name}: failed to read Parquet batch"), e))?;
        if batch.num_rows() > 0 {
            batches.push(batch);
        }
    }

    let table = ColumnTable::from_raw_batches(name, &projected_schema, specs, batches)?;
    tracing::info!(
        table = name,
        path = %path.display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "loaded source table"
    );
    Ok(table)
}
