//! Metric catalog for gridcast.
//!
//! The catalog is the single source of truth for which metric names a query
//! may request, what type each one yields, and which source columns feed it.
//! It also fixes the physical layout of the two source tables ([`layout`]) and
//! hosts the pure derivation functions for computed metrics ([`derived`]).
//!
//! Two catalogs ship with the crate:
//!
//! * [`MetricCatalog::summary`]: the published forecast summary (`MAP`, the
//!   HDI bounds, and the threshold probabilities). This is the default.
//! * [`MetricCatalog::raw`]: every metric source column under its own name.
//!
//! Callers can also assemble a custom catalog with [`MetricCatalog::try_new`].
#![forbid(unsafe_code)]

mod catalog;
pub mod derived;
pub mod layout;

pub use catalog::{
    CatalogVersion, ColumnRef, MetricCatalog, MetricDef, MetricSelection, MetricSource,
    MetricType, SourceSide,
};
pub use derived::{mean_of_components, mean_of_list_columns};
pub use layout::SourceLayout;
