//! Column store loading for gridcast.
//!
//! Source tables are flat Parquet files. The loader reads only the columns a
//! caller declares, casts them to the three semantic types the engine works
//! with ([`ColumnType`]), and hands back an immutable [`ColumnTable`] whose
//! Arrow batches are shared by every query.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use gridcast_storage::{ColumnSpec, LoadOptions, load_parquet_table};
//!
//! # fn main() -> gridcast_result::Result<()> {
//! let specs = [ColumnSpec::int64("month_id"), ColumnSpec::int64("priogrid_id")];
//! let table = load_parquet_table(
//!     "primary",
//!     Path::new("data/preds_001.parquet"),
//!     &specs,
//!     &LoadOptions::default(),
//! )?;
//! assert!(table.num_rows() > 0);
//! # Ok(())
//! # }
//! ```

mod reader;
mod table;
mod types;
mod writer;

use gridcast_result::{Error, Result};

pub use reader::load_parquet_table;
pub use table::ColumnTable;
pub use types::{ColumnSpec, ColumnType};
pub use writer::write_parquet_file;

/// Default number of rows per decoded batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Options controlling how source tables are read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Rows per decoded `RecordBatch`. Query results stream at the same
    /// granularity.
    pub batch_size: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl LoadOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidArgumentError(
                "load batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
