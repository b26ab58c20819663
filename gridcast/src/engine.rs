use std::sync::Arc;
use std::time::Instant;

use gridcast_catalog::layout::{
    CELL_ID, KEY_COLUMNS, PERIOD_ID, PRIMARY_TABLE, REGION_ID, SECONDARY_TABLE,
};
use gridcast_catalog::{MetricCatalog, SourceLayout};
use gridcast_join::{JoinKey, LeftJoinIndex, ensure_unique_keys};
use gridcast_result::{Error, Result};
use gridcast_scan::{MetricProjector, RecordStream};
use gridcast_storage::{ColumnSpec, ColumnTable, load_parquet_table};

use crate::accessors::{self, CellLocation};
use crate::eager::EagerJoin;
use crate::lazy::LazyJoin;
use crate::options::{EngineOptions, JoinStrategy, SourcePaths};
use crate::query::ForecastQuery;
use crate::strategy::JoinedTable;

/// Query engine over one primary and one secondary forecast table.
///
/// Construction loads and validates both tables, builds the composite-key
/// index, and (for [`JoinStrategy::Eager`]) materializes the join. After
/// that the engine is read-only: clones share every table, and any number of
/// threads may query concurrently without locking.
#[derive(Clone, Debug)]
pub struct ForecastEngine {
    primary: ColumnTable,
    table: Arc<dyn JoinedTable>,
    catalog: Arc<MetricCatalog>,
}

impl ForecastEngine {
    /// Load both source files and build the engine.
    pub fn open(paths: &SourcePaths, options: EngineOptions) -> Result<Self> {
        options.validate()?;
        let catalog = options.resolve_catalog();
        let layout = SourceLayout::for_catalog(&catalog);
        let load = options.load_options();

        let primary = load_parquet_table(PRIMARY_TABLE, &paths.primary, layout.primary(), &load)?;
        let secondary =
            load_parquet_table(SECONDARY_TABLE, &paths.secondary, layout.secondary(), &load)?;
        Self::build(primary, secondary, catalog, &layout, &options)
    }

    /// Build the engine over tables already in memory.
    ///
    /// Both tables must carry the layout the catalog declares; extra columns
    /// are dropped.
    /// Their batches are kept as given, whatever
    /// [`EngineOptions::batch_size`] says.
    pub fn from_tables(
        primary: ColumnTable,
        secondary: ColumnTable,
        options: EngineOptions,
    ) -> Result<Self> {
        options.validate()?;
        let catalog = options.resolve_catalog();
        let layout = SourceLayout::for_catalog(&catalog);
        Self::build(primary, secondary, catalog, &layout, &options)
    }

    fn build(
        primary: ColumnTable,
        secondary: ColumnTable,
        catalog: Arc<MetricCatalog>,
        layout: &SourceLayout,
        options: &EngineOptions,
    ) -> Result<Self> {
        let started = Instant::now();
        let primary = conform(&primary, layout.primary())?;
        let secondary = conform(&secondary, layout.secondary())?;

        ensure_unique_keys(&primary, &KEY_COLUMNS)?;
        let keys: Vec<JoinKey> = KEY_COLUMNS.iter().map(|k| JoinKey::same(*k)).collect();
        let index = LeftJoinIndex::build(&secondary, &keys, &options.join_options())?;
        let matched = index.key_index().len();

        let table: Arc<dyn JoinedTable> = match options.strategy {
            JoinStrategy::Eager => Arc::new(EagerJoin::new(&primary, &index)?),
            JoinStrategy::Lazy => Arc::new(LazyJoin::new(primary.clone(), index)?),
        };

        tracing::info!(
            strategy = %options.strategy,
            catalog = catalog.version(),
            primary_rows = primary.num_rows(),
            secondary_rows = secondary.num_rows(),
            secondary_keys = matched,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "forecast engine ready"
        );

        Ok(Self {
            primary,
            table,
            catalog,
        })
    }

    /// Stream the records matching `query`.
    ///
    /// Metric names are validated before anything is read; an unknown name
    /// fails with [`Error::ValidationError`] and no stream is created.
    pub fn query(&self, query: &ForecastQuery) -> Result<RecordStream<'_>> {
        let selection = self.catalog.resolve(query.metric_names())?;
        let scan = self.table.scan(query.filter(), &selection)?;
        let projector = MetricProjector::bind(&selection, &scan.schema)?;
        tracing::debug!(
            strategy = %self.table.strategy(),
            metrics = selection.len(),
            filtered = !query.filter().is_unconstrained(),
            "query"
        );
        Ok(RecordStream::new(scan, projector))
    }

    pub fn distinct_periods(&self) -> Result<Vec<i64>> {
        accessors::distinct_values(&self.primary, PERIOD_ID)
    }

    pub fn distinct_cells(&self) -> Result<Vec<i64>> {
        accessors::distinct_values(&self.primary, CELL_ID)
    }

    /// Region ids in use; rows without a region are skipped.
    pub fn distinct_regions(&self) -> Result<Vec<i64>> {
        accessors::distinct_values(&self.primary, REGION_ID)
    }

    pub fn cell_locations(&self) -> Result<Vec<CellLocation>> {
        accessors::cell_locations(&self.primary)
    }

    /// Names of every metric a query may request, in catalog order.
    pub fn available_metrics(&self) -> Vec<String> {
        self.catalog.names().map(str::to_string).collect()
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn strategy(&self) -> JoinStrategy {
        self.table.strategy()
    }

    /// Rows in the joined table, which equals the primary row count.
    pub fn num_rows(&self) -> usize {
        self.table.num_rows()
    }
}

/// Check `table` against the declared layout and narrow it to exactly those
/// columns, in layout order.
fn conform(table: &ColumnTable, specs: &[ColumnSpec]) -> Result<ColumnTable> {
    let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    table.require_columns(&names)?;
    for spec in specs {
        let found = table.column_type(&spec.name)?;
        if found != spec.column_type {
            return Err(Error::LoadError(format!(
                "{}: column '{}' has type {found}, expected {}",
                table.name(),
                spec.name,
                spec.column_type
            )));
        }
    }
    table.project(&names)
}
