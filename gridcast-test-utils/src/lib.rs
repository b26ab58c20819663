//! Shared helpers for gridcast tests and benchmarks.
//!
//! [`PrimaryRow`] and [`SecondaryRow`] describe source rows in plain Rust;
//! [`primary_table`] and [`secondary_table`] turn them into column tables with
//! the layout the summary and raw catalogs load.

use std::path::Path;
use std::sync::{Arc, Once};

use arrow::array::{ArrayRef, Float32Array, Int64Array, ListArray, RecordBatch};
use arrow::datatypes::{Float32Type, Schema};
use gridcast_catalog::layout::{
    BASE_COLUMNS, KEY_COLUMNS, PRIMARY_FILE, PRIMARY_TABLE, SECONDARY_FILE, SECONDARY_TABLE,
};
use gridcast_catalog::{MetricCatalog, SourceLayout};
use gridcast_result::Result;
use gridcast_storage::{ColumnTable, write_parquet_file};
use rand::Rng;

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let env = std::env::var("RUST_LOG").ok();
        let filter = match env {
            Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            None => EnvFilter::new("info"),
        };
        let _ = fmt().with_env_filter(filter).with_target(false).with_test_writer().try_init();
    });
}

/// One forecast row. `best` holds the three `pred_ln_*_best` sample lists.
///
/// [`PrimaryRow::new`] derives the grid position from the cell id and puts
/// every cell in a region between 1 and 7, so region 0 is never populated.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimaryRow {
    pub period: i64,
    pub cell: i64,
    pub region: Option<i64>,
    pub row: i64,
    pub col: i64,
    pub lat: f32,
    pub lon: f32,
    pub best: [Option<Vec<f32>>; 3],
}

impl PrimaryRow {
    pub fn new(period: i64, cell: i64, best: [Option<Vec<f32>>; 3]) -> Self {
        Self {
            period,
            cell,
            region: Some(cell % 7 + 1),
            row: cell / 720,
            col: cell % 720,
            lat: (cell / 720) as f32 * 0.5 - 89.75,
            lon: (cell % 720) as f32 * 0.5 - 179.75,
            best,
        }
    }

    pub fn with_region(mut self, region: Option<i64>) -> Self {
        self.region = region;
        self
    }
}

/// One uncertainty row. `values` holds the twelve interval columns in
/// source order.
#[derive(Clone, Debug, PartialEq)]
pub struct SecondaryRow {
    pub period: i64,
    pub cell: i64,
    pub values: [Option<f32>; 12],
}

impl SecondaryRow {
    pub fn new(period: i64, cell: i64, values: [Option<f32>; 12]) -> Self {
        Self {
            period,
            cell,
            values,
        }
    }

    /// A row whose twelve values are `base`, `base + 1`, ...
    pub fn sequential(period: i64, cell: i64, base: f32) -> Self {
        Self::new(period, cell, std::array::from_fn(|i| Some(base + i as f32)))
    }
}

fn layout() -> SourceLayout {
    SourceLayout::for_catalog(&MetricCatalog::summary())
}

fn schema_for(specs: &[gridcast_storage::ColumnSpec]) -> Arc<Schema> {
    Arc::new(Schema::new(
        specs.iter().map(|s| s.field()).collect::<Vec<_>>(),
    ))
}

fn primary_batch(schema: &Arc<Schema>, rows: &[PrimaryRow]) -> RecordBatch {
    let int = |f: &dyn Fn(&PrimaryRow) -> Option<i64>| -> ArrayRef {
        Arc::new(rows.iter().map(f).collect::<Int64Array>())
    };
    let float = |f: &dyn Fn(&PrimaryRow) -> Option<f32>| -> ArrayRef {
        Arc::new(rows.iter().map(f).collect::<Float32Array>())
    };
    let list = |i: usize| -> ArrayRef {
        Arc::new(ListArray::from_iter_primitive::<Float32Type, _, _>(
            rows.iter()
                .map(|r| r.best[i].as_ref().map(|v| v.iter().copied().map(Some).collect::<Vec<_>>())),
        ))
    };

    let mut columns = vec![
        int(&|r| Some(r.cell)),
        int(&|r| Some(r.period)),
        int(&|r| r.region),
        int(&|r| Some(r.row)),
        int(&|r| Some(r.col)),
        float(&|r| Some(r.lat)),
        float(&|r| Some(r.lon)),
    ];
    debug_assert_eq!(columns.len(), BASE_COLUMNS.len());
    columns.extend((0..3).map(list));
    RecordBatch::try_new(Arc::clone(schema), columns).expect("primary fixture batch")
}

fn secondary_batch(schema: &Arc<Schema>, rows: &[SecondaryRow]) -> RecordBatch {
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.period))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.cell))),
    ];
    debug_assert_eq!(KEY_COLUMNS.len(), 2);
    for i in 0..12 {
        columns.push(Arc::new(
            rows.iter().map(|r| r.values[i]).collect::<Float32Array>(),
        ));
    }
    RecordBatch::try_new(Arc::clone(schema), columns).expect("secondary fixture batch")
}

/// Primary table over `rows`, split into batches of at most `batch_size`.
pub fn primary_table(rows: &[PrimaryRow], batch_size: usize) -> ColumnTable {
    let schema = schema_for(layout().primary());
    let batches = rows
        .chunks(batch_size.max(1))
        .map(|chunk| primary_batch(&schema, chunk))
        .collect();
    ColumnTable::try_new(PRIMARY_TABLE, schema, batches).expect("primary fixture table")
}

/// Secondary table over `rows`, split into batches of at most `batch_size`.
pub fn secondary_table(rows: &[SecondaryRow], batch_size: usize) -> ColumnTable {
    let schema = schema_for(layout().secondary());
    let batches = rows
        .chunks(batch_size.max(1))
        .map(|chunk| secondary_batch(&schema, chunk))
        .collect();
    ColumnTable::try_new(SECONDARY_TABLE, schema, batches).expect("secondary fixture table")
}

/// Two periods (409, 410) by two cells (62356, 81761); the secondary table
/// lacks (410, 81761).
///
/// The primary lists of (410, 81761) are `[1, 2]`, `[3]`, `[]`, so its MAP is
/// 2.0.
pub fn scenario_rows() -> (Vec<PrimaryRow>, Vec<SecondaryRow>) {
    let primary = vec![
        PrimaryRow::new(409, 62356, [Some(vec![0.5]), Some(vec![1.5]), Some(vec![])]),
        PrimaryRow::new(409, 81761, [Some(vec![4.0, 6.0]), None, Some(vec![])]),
        PrimaryRow::new(410, 62356, [Some(vec![]), Some(vec![]), Some(vec![])]),
        PrimaryRow::new(
            410,
            81761,
            [Some(vec![1.0, 2.0]), Some(vec![3.0]), Some(vec![])],
        ),
    ];
    let secondary = vec![
        SecondaryRow::sequential(409, 62356, 0.0),
        SecondaryRow::sequential(409, 81761, 100.0),
        SecondaryRow::sequential(410, 62356, 200.0),
    ];
    (primary, secondary)
}

/// Random source rows over `periods` x `cells`.
///
/// Roughly `coverage` of the primary keys have a secondary row; secondary
/// values, sample lists, and regions include nulls and empties.
pub fn random_rows<R: Rng>(
    rng: &mut R,
    periods: std::ops::Range<i64>,
    cells: std::ops::Range<i64>,
    coverage: f64,
) -> (Vec<PrimaryRow>, Vec<SecondaryRow>) {
    let mut primary = Vec::new();
    let mut secondary = Vec::new();
    for period in periods {
        for cell in cells.clone() {
            let best = std::array::from_fn(|_| match rng.random_range(0..5) {
                0 => None,
                1 => Some(Vec::new()),
                _ => (0..rng.random_range(1..6))
                    .map(|_| rng.random_range(-2.0_f32..8.0))
                    .collect::<Vec<_>>()
                    .into(),
            });
            let region = (!rng.random_bool(0.1)).then(|| rng.random_range(0..4));
            primary.push(PrimaryRow::new(period, cell, best).with_region(region));

            if rng.random_bool(coverage) {
                let values =
                    std::array::from_fn(|_| (!rng.random_bool(0.1)).then(|| rng.random::<f32>()));
                secondary.push(SecondaryRow::new(period, cell, values));
            }
        }
    }
    (primary, secondary)
}

/// Write both tables as Parquet files under their default names in `dir`.
pub fn write_source_dir(dir: &Path, primary: &ColumnTable, secondary: &ColumnTable) -> Result<()> {
    write_parquet_file(&dir.join(PRIMARY_FILE), primary.batches())?;
    write_parquet_file(&dir.join(SECONDARY_FILE), secondary.batches())?;
    Ok(())
}
