//! Parquet file writing utilities.

use std::fs::File;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use gridcast_result::{Error, Result};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

/// Write batches sharing one schema to a Parquet file at `path`.
///
/// Produces source files in the layout the loader reads back; used for test
/// fixtures and data preparation tooling.
pub fn write_parquet_file(path: &Path, batches: &[RecordBatch]) -> Result<()> {
    let Some(first) = batches.first() else {
        return Err(Error::InvalidArgumentError(
            "cannot write a Parquet file without batches".to_string(),
        ));
    };

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_max_row_group_size(8192)
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, first.schema(), Some(props))
        .map_err(|e| Error::Internal(format!("failed to create Parquet writer: {}", e)))?;

    for batch in batches {
        writer.write(batch).map_err(|e| {
            Error::Internal(format!("failed to write RecordBatch to Parquet: {}", e))
        })?;
    }

    writer
        .close()
        .map_err(|e| Error::Internal(format!("failed to close Parquet writer: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    #[test]
    fn writes_parquet_magic() {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.parquet");
        write_parquet_file(&path, &[batch]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"PAR1");
    }

    #[test]
    fn refuses_empty_batch_list() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_parquet_file(&dir.path().join("x.parquet"), &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));
    }
}
