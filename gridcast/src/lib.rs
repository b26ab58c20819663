//! gridcast: a flat forecast query engine over Arrow column tables.
//!
//! This crate is the entrypoint of the gridcast workspace. It loads a primary
//! forecast table and a secondary uncertainty table keyed by
//! (`month_id`, `priogrid_id`), left-joins them, and answers queries that
//! filter by period, cell, and region while returning a chosen subset of
//! metrics per row.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gridcast::{EngineOptions, ForecastEngine, ForecastQuery, SourcePaths};
//!
//! # fn main() -> gridcast::Result<()> {
//! let engine = ForecastEngine::open(&SourcePaths::from_dir("data"), EngineOptions::default())?;
//! let query = ForecastQuery::new().periods([409]).metrics(["MAP", "HDI_90_lower"]);
//! for record in engine.query(&query)? {
//!     let record = record?;
//!     println!("{} {:?}", record.cell_id, record.metrics.get("MAP"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The workspace is layered, leaves first:
//!
//! - **Errors** (`gridcast-result`): the shared `Error` enum.
//! - **Storage** (`gridcast-storage`): Parquet loading into immutable column tables.
//! - **Catalog** (`gridcast-catalog`): versioned metric catalogs and the MAP derivation.
//! - **Join** (`gridcast-join`): composite-key hash index and left join.
//! - **Scan** (`gridcast-scan`): row filters, metric projection, record streaming.
//!
//! This crate ties them together behind [`ForecastEngine`], with an eager
//! strategy that joins once at load time and a lazy one that joins only the
//! columns each query needs.

mod accessors;
mod eager;
mod engine;
mod lazy;
mod options;
mod query;
mod strategy;

pub use accessors::CellLocation;
pub use engine::ForecastEngine;
pub use options::{EngineOptions, JoinStrategy, SourcePaths};
pub use query::ForecastQuery;
pub use strategy::JoinedTable;

pub use gridcast_catalog::{CatalogVersion, ColumnRef, MetricCatalog, MetricDef, MetricType};
pub use gridcast_join::DuplicateKeyPolicy;
pub use gridcast_result::{Error, Result};
pub use gridcast_scan::{ForecastRecord, MetricValue, MetricValues, RecordStream, RowFilter};

pub mod storage {
    //! Column tables and the Parquet reader and writer.

    pub use gridcast_storage::{
        ColumnSpec, ColumnTable, ColumnType, DEFAULT_BATCH_SIZE, LoadOptions, load_parquet_table,
        write_parquet_file,
    };
}

pub mod layout {
    //! Source column and file names.

    pub use gridcast_catalog::SourceLayout;
    pub use gridcast_catalog::layout::*;
}
