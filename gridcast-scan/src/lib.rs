//! Predicate evaluation, metric projection, and record streaming.
//!
//! A query flows through three stages once a strategy has produced joined
//! batches: [`RowFilter`] keeps rows whose period, cell, and region are in
//! the requested allow-lists, [`MetricProjector`] decodes the selected metric
//! columns (computing derived ones), and [`RecordStream`] hands out one
//! [`ForecastRecord`] at a time.
#![forbid(unsafe_code)]

pub mod predicate;
pub mod projection;
pub mod record;
pub mod row_stream;

pub use predicate::{BoundFilter, RowFilter};
pub use projection::{MetricProjector, ProjectedBatch};
pub use record::{ForecastRecord, MetricValue, MetricValues};
pub use row_stream::{BatchIter, RecordStream, ScanBatches};
