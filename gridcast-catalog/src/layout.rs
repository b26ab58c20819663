//! Physical layout of the primary and secondary source tables.

use gridcast_storage::{ColumnSpec, ColumnType};

use crate::catalog::{MetricCatalog, SourceSide};

/// Time period identifier (first half of the composite key).
pub const PERIOD_ID: &str = "month_id";
/// Spatial cell identifier (second half of the composite key).
pub const CELL_ID: &str = "priogrid_id";
/// Administrative region identifier.
pub const REGION_ID: &str = "country_id";
pub const LATITUDE: &str = "lat";
pub const LONGITUDE: &str = "lon";
pub const GRID_ROW: &str = "row";
pub const GRID_COL: &str = "col";

/// Composite key columns, in the order they are hashed. Present in both tables.
pub const KEY_COLUMNS: [&str; 2] = [PERIOD_ID, CELL_ID];

/// Non-metric primary columns every record carries, in table order.
pub const BASE_COLUMNS: [(&str, ColumnType); 7] = [
    (CELL_ID, ColumnType::Int64),
    (PERIOD_ID, ColumnType::Int64),
    (REGION_ID, ColumnType::Int64),
    (GRID_ROW, ColumnType::Int64),
    (GRID_COL, ColumnType::Int64),
    (LATITUDE, ColumnType::Float32),
    (LONGITUDE, ColumnType::Float32),
];

pub const PRIMARY_TABLE: &str = "primary";
pub const SECONDARY_TABLE: &str = "secondary";

/// File names of the two source tables inside a data directory.
pub const PRIMARY_FILE: &str = "preds_001.parquet";
pub const SECONDARY_FILE: &str = "preds_001_90_hdi.parquet";

/// Whether `name` is one of the fixed, non-metric primary columns.
pub fn is_base_column(name: &str) -> bool {
    BASE_COLUMNS.iter().any(|(base, _)| *base == name)
}

/// The columns the loader must read from each source table for a catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLayout {
    primary: Vec<ColumnSpec>,
    secondary: Vec<ColumnSpec>,
}

impl SourceLayout {
    /// Base columns plus every metric source column the catalog declares.
    pub fn for_catalog(catalog: &MetricCatalog) -> Self {
        let mut primary: Vec<ColumnSpec> = BASE_COLUMNS
            .iter()
            .map(|(name, ty)| ColumnSpec::new(*name, *ty))
            .collect();
        primary.extend(catalog.source_specs(SourceSide::Primary));

        let mut secondary: Vec<ColumnSpec> =
            KEY_COLUMNS.iter().map(|name| ColumnSpec::int64(*name)).collect();
        secondary.extend(catalog.source_specs(SourceSide::Secondary));

        Self { primary, secondary }
    }

    pub fn primary(&self) -> &[ColumnSpec] {
        &self.primary
    }

    pub fn secondary(&self) -> &[ColumnSpec] {
        &self.secondary
    }

    /// Names of the primary columns, in load order.
    pub fn primary_names(&self) -> Vec<&str> {
        self.primary.iter().map(|s| s.name.as_str()).collect()
    }

    /// Names of the secondary columns, in load order.
    pub fn secondary_names(&self) -> Vec<&str> {
        self.secondary.iter().map(|s| s.name.as_str()).collect()
    }
}
