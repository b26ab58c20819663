use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use gridcast_result::{Error, Result};
use gridcast_storage::{ColumnSpec, ColumnType};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::layout;

/// Which source table a column lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceSide {
    /// The forecast table; every record comes from exactly one of its rows.
    Primary,
    /// The uncertainty table, left-joined onto the primary by composite key.
    Secondary,
}

impl fmt::Display for SourceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSide::Primary => write!(f, "primary"),
            SourceSide::Secondary => write!(f, "secondary"),
        }
    }
}

/// A source column on one side of the join.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub side: SourceSide,
    pub name: Arc<str>,
}

impl ColumnRef {
    pub fn primary(name: impl Into<Arc<str>>) -> Self {
        Self {
            side: SourceSide::Primary,
            name: name.into(),
        }
    }

    pub fn secondary(name: impl Into<Arc<str>>) -> Self {
        Self {
            side: SourceSide::Secondary,
            name: name.into(),
        }
    }
}

/// Value type a metric yields in output records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// A single 32-bit float, copied from a source column.
    Float32,
    /// A float sequence, copied from a list-valued source column.
    Float32List,
    /// Mean over the elements of several list-valued source columns, as `f64`.
    DerivedMean,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricType::Float32 => write!(f, "float32"),
            MetricType::Float32List => write!(f, "list<float32>"),
            MetricType::DerivedMean => write!(f, "mean"),
        }
    }
}

/// Where a metric's value comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetricSource {
    Column(ColumnRef),
    MeanOf(Vec<ColumnRef>),
}

/// One catalog entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricDef {
    name: Arc<str>,
    metric_type: MetricType,
    source: MetricSource,
}

impl MetricDef {
    /// A metric copied from a single scalar column.
    pub fn float32(name: impl Into<Arc<str>>, column: ColumnRef) -> Self {
        Self {
            name: name.into(),
            metric_type: MetricType::Float32,
            source: MetricSource::Column(column),
        }
    }

    /// A metric copied from a single list-valued column.
    pub fn float32_list(name: impl Into<Arc<str>>, column: ColumnRef) -> Self {
        Self {
            name: name.into(),
            metric_type: MetricType::Float32List,
            source: MetricSource::Column(column),
        }
    }

    /// A metric derived as the mean over several list-valued columns.
    pub fn mean_of(name: impl Into<Arc<str>>, columns: Vec<ColumnRef>) -> Self {
        Self {
            name: name.into(),
            metric_type: MetricType::DerivedMean,
            source: MetricSource::MeanOf(columns),
        }
    }

    /// Assemble an entry from parts. Consistency is checked by
    /// [`MetricCatalog::try_new`].
    pub fn new(name: impl Into<Arc<str>>, metric_type: MetricType, source: MetricSource) -> Self {
        Self {
            name: name.into(),
            metric_type,
            source,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn source(&self) -> &MetricSource {
        &self.source
    }

    /// Source columns in declaration order.
    pub fn source_columns(&self) -> &[ColumnRef] {
        match &self.source {
            MetricSource::Column(column) => std::slice::from_ref(column),
            MetricSource::MeanOf(columns) => columns,
        }
    }

    /// Storage type every source column of this metric must have.
    pub fn source_type(&self) -> ColumnType {
        match self.metric_type {
            MetricType::Float32 => ColumnType::Float32,
            MetricType::Float32List | MetricType::DerivedMean => ColumnType::Float32List,
        }
    }

    fn check_shape(&self) -> Result<()> {
        let shape_ok = matches!(
            (self.metric_type, &self.source),
            (MetricType::Float32, MetricSource::Column(_))
                | (MetricType::Float32List, MetricSource::Column(_))
                | (MetricType::DerivedMean, MetricSource::MeanOf(_))
        );
        if !shape_ok {
            return Err(Error::InvalidArgumentError(format!(
                "metric '{}': type {} does not match its source",
                self.name, self.metric_type
            )));
        }
        if self.source_columns().is_empty() {
            return Err(Error::InvalidArgumentError(format!(
                "metric '{}': derived mean needs at least one source column",
                self.name
            )));
        }
        Ok(())
    }
}

/// Names of the catalogs that ship with the crate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CatalogVersion {
    #[default]
    Summary,
    Raw,
}

impl CatalogVersion {
    pub fn catalog(self) -> MetricCatalog {
        match self {
            CatalogVersion::Summary => MetricCatalog::summary(),
            CatalogVersion::Raw => MetricCatalog::raw(),
        }
    }
}

impl fmt::Display for CatalogVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogVersion::Summary => write!(f, "summary"),
            CatalogVersion::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for CatalogVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" => Ok(CatalogVersion::Summary),
            "raw" => Ok(CatalogVersion::Raw),
            other => Err(Error::InvalidArgumentError(format!(
                "unknown catalog '{other}' (expected 'summary' or 'raw')"
            ))),
        }
    }
}

const BEST_LISTS: [&str; 3] = ["pred_ln_sb_best", "pred_ln_ns_best", "pred_ln_os_best"];

// (summary name, secondary source column), in published order.
const INTERVAL_COLUMNS: [(&str, &str); 12] = [
    ("HDI_50_lower", "pred_ln_sb_best_hdi_lower"),
    ("HDI_50_upper", "pred_ln_sb_best_hdi_upper"),
    ("HDI_90_lower", "pred_ln_ns_best_hdi_lower"),
    ("HDI_90_upper", "pred_ln_ns_best_hdi_upper"),
    ("HDI_99_lower", "pred_ln_os_best_hdi_lower"),
    ("HDI_99_upper", "pred_ln_os_best_hdi_upper"),
    ("prob_threshold_1", "pred_ln_sb_prob_hdi_lower"),
    ("prob_threshold_2", "pred_ln_sb_prob_hdi_upper"),
    ("prob_threshold_3", "pred_ln_ns_prob_hdi_lower"),
    ("prob_threshold_4", "pred_ln_ns_prob_hdi_upper"),
    ("prob_threshold_5", "pred_ln_os_prob_hdi_lower"),
    ("prob_threshold_6", "pred_ln_os_prob_hdi_upper"),
];

/// Versioned, immutable registry of the metrics a query may request.
///
/// Built once and shared behind an `Arc`; lookups never allocate.
#[derive(Clone, Debug)]
pub struct MetricCatalog {
    version: Arc<str>,
    metrics: Vec<MetricDef>,
    index: FxHashMap<Arc<str>, usize>,
}

impl MetricCatalog {
    /// The published summary metrics (`MAP`, HDI bounds, threshold
    /// probabilities). Version tag `summary-v1`.
    pub fn summary() -> Self {
        let mut metrics = Vec::with_capacity(1 + INTERVAL_COLUMNS.len());
        metrics.push(MetricDef::mean_of(
            "MAP",
            BEST_LISTS.iter().map(|c| ColumnRef::primary(*c)).collect(),
        ));
        metrics.extend(
            INTERVAL_COLUMNS
                .iter()
                .map(|(name, column)| MetricDef::float32(*name, ColumnRef::secondary(*column))),
        );
        Self::from_trusted("summary-v1", metrics)
    }

    /// Every metric source column under its own name. Version tag `raw-v1`.
    pub fn raw() -> Self {
        let mut metrics = Vec::with_capacity(BEST_LISTS.len() + INTERVAL_COLUMNS.len());
        metrics.extend(
            BEST_LISTS
                .iter()
                .map(|c| MetricDef::float32_list(*c, ColumnRef::primary(*c))),
        );
        metrics.extend(
            INTERVAL_COLUMNS
                .iter()
                .map(|(_, c)| MetricDef::float32(*c, ColumnRef::secondary(*c))),
        );
        Self::from_trusted("raw-v1", metrics)
    }

    /// Build a custom catalog.
    ///
    /// Rejects empty or duplicate metric names, metrics whose type does not
    /// match their source, derived means without sources, source columns that
    /// shadow the fixed record columns, a source column declared with two
    /// different types, and secondary columns that collide with primary ones.
    pub fn try_new(version: impl Into<Arc<str>>, metrics: Vec<MetricDef>) -> Result<Self> {
        let mut index = FxHashMap::default();
        let mut column_types: FxHashMap<(SourceSide, &str), ColumnType> = FxHashMap::default();

        for (pos, metric) in metrics.iter().enumerate() {
            if metric.name.is_empty() {
                return Err(Error::InvalidArgumentError(
                    "metric names must not be empty".to_string(),
                ));
            }
            if index.insert(Arc::clone(&metric.name), pos).is_some() {
                return Err(Error::InvalidArgumentError(format!(
                    "duplicate metric '{}'",
                    metric.name
                )));
            }
            metric.check_shape()?;

            for column in metric.source_columns() {
                if layout::is_base_column(&column.name) {
                    return Err(Error::InvalidArgumentError(format!(
                        "metric '{}': source column '{}' is a reserved record column",
                        metric.name, column.name
                    )));
                }
                let ty = metric.source_type();
                match column_types.insert((column.side, &column.name), ty) {
                    Some(previous) if previous != ty => {
                        return Err(Error::InvalidArgumentError(format!(
                            "{} column '{}' declared as both {previous} and {ty}",
                            column.side, column.name
                        )));
                    }
                    _ => {}
                }
            }
        }

        for (side, name) in column_types.keys() {
            if *side == SourceSide::Secondary
                && column_types.contains_key(&(SourceSide::Primary, *name))
            {
                return Err(Error::InvalidArgumentError(format!(
                    "secondary column '{name}' collides with a primary column"
                )));
            }
        }

        Ok(Self {
            version: version.into(),
            metrics,
            index,
        })
    }

    fn from_trusted(version: &str, metrics: Vec<MetricDef>) -> Self {
        let index = metrics
            .iter()
            .enumerate()
            .map(|(pos, m)| (Arc::clone(&m.name), pos))
            .collect();
        Self {
            version: version.into(),
            metrics,
            index,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn metrics(&self) -> &[MetricDef] {
        &self.metrics
    }

    pub fn get(&self, name: &str) -> Option<&MetricDef> {
        self.index.get(name).map(|&pos| &self.metrics[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Metric names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.metrics.iter().map(MetricDef::name)
    }

    /// Distinct source columns on `side`, in catalog order, typed for loading.
    pub fn source_specs(&self, side: SourceSide) -> Vec<ColumnSpec> {
        let mut seen = FxHashSet::default();
        let mut specs = Vec::new();
        for metric in &self.metrics {
            for column in metric.source_columns() {
                if column.side == side && seen.insert(Arc::clone(&column.name)) {
                    specs.push(ColumnSpec::new(column.name.as_ref(), metric.source_type()));
                }
            }
        }
        specs
    }

    /// Validate a metric request and fix the output projection.
    ///
    /// `None` and an empty list both select every metric in catalog order.
    /// A non-empty list keeps
    /// request order and collapses repeated names onto their first
    /// occurrence. Any unknown name fails the whole request with
    /// [`Error::ValidationError`] listing every unknown name once, in the
    /// order they were requested.
    pub fn resolve<S: AsRef<str>>(&self, requested: Option<&[S]>) -> Result<MetricSelection> {
        let requested = match requested {
            Some(requested) if !requested.is_empty() => requested,
            _ => {
                return Ok(MetricSelection {
                    metrics: self.metrics.clone(),
                });
            }
        };

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut metrics = Vec::with_capacity(requested.len());
        let mut invalid: Vec<&str> = Vec::new();
        for name in requested {
            let name = name.as_ref();
            if !seen.insert(name) {
                continue;
            }
            match self.get(name) {
                Some(metric) => metrics.push(metric.clone()),
                None => invalid.push(name),
            }
        }

        if !invalid.is_empty() {
            tracing::debug!(
                catalog = %self.version,
                invalid = ?invalid,
                "rejected metric request"
            );
            return Err(Error::invalid_metrics(invalid));
        }
        Ok(MetricSelection { metrics })
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::summary()
    }
}

/// A validated, ordered set of metrics for one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricSelection {
    metrics: Vec<MetricDef>,
}

impl MetricSelection {
    pub fn metrics(&self) -> &[MetricDef] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.metrics.iter().map(MetricDef::name)
    }

    /// Distinct source column names needed on `side`, in first-use order.
    pub fn source_columns(&self, side: SourceSide) -> Vec<Arc<str>> {
        let mut seen = FxHashSet::default();
        let mut columns = Vec::new();
        for metric in &self.metrics {
            for column in metric.source_columns() {
                if column.side == side && seen.insert(Arc::clone(&column.name)) {
                    columns.push(Arc::clone(&column.name));
                }
            }
        }
        columns
    }

    /// Whether any selected metric reads the secondary table.
    pub fn needs_secondary(&self) -> bool {
        self.metrics.iter().any(|m| {
            m.source_columns()
                .iter()
                .any(|c| c.side == SourceSide::Secondary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_catalog_shape() {
        let catalog = MetricCatalog::summary();
        assert_eq!(catalog.version(), "summary-v1");
        assert_eq!(catalog.len(), 13);

        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names[0], "MAP");
        assert_eq!(names[1], "HDI_50_lower");
        assert_eq!(names[12], "prob_threshold_6");

        let map = catalog.get("MAP").unwrap();
        assert_eq!(map.metric_type(), MetricType::DerivedMean);
        assert_eq!(map.source_columns().len(), 3);
        assert!(
            map.source_columns()
                .iter()
                .all(|c| c.side == SourceSide::Primary)
        );

        let hdi = catalog.get("HDI_90_upper").unwrap();
        assert_eq!(
            hdi.source(),
            &MetricSource::Column(ColumnRef::secondary("pred_ln_ns_best_hdi_upper"))
        );
    }

    #[test]
    fn raw_catalog_uses_source_names() {
        let catalog = MetricCatalog::raw();
        assert_eq!(catalog.version(), "raw-v1");
        assert_eq!(catalog.len(), 15);
        assert_eq!(
            catalog.get("pred_ln_os_best").unwrap().metric_type(),
            MetricType::Float32List
        );
        assert_eq!(
            catalog.get("pred_ln_sb_prob_hdi_lower").unwrap().metric_type(),
            MetricType::Float32
        );
        assert!(!catalog.contains("MAP"));
    }

    #[test]
    fn resolve_without_request_selects_everything() {
        let catalog = MetricCatalog::summary();
        let selection = catalog.resolve::<&str>(None).unwrap();
        assert_eq!(
            selection.names().collect::<Vec<_>>(),
            catalog.names().collect::<Vec<_>>()
        );
        assert!(selection.needs_secondary());
    }

    #[test]
    fn resolve_keeps_request_order_and_collapses_repeats() {
        let catalog = MetricCatalog::summary();
        let selection = catalog
            .resolve(Some(&["prob_threshold_2", "MAP", "prob_threshold_2"][..]))
            .unwrap();
        assert_eq!(
            selection.names().collect::<Vec<_>>(),
            vec!["prob_threshold_2", "MAP"]
        );
        assert_eq!(
            selection.source_columns(SourceSide::Secondary),
            vec![Arc::<str>::from("pred_ln_sb_prob_hdi_upper")]
        );
        assert_eq!(selection.source_columns(SourceSide::Primary).len(), 3);
    }

    #[test]
    fn resolve_reports_every_unknown_name() {
        let catalog = MetricCatalog::summary();
        let err = catalog
            .resolve(Some(
                &["MAP", "not_a_real_metric", "HDI_42_lower", "not_a_real_metric"][..],
            ))
            .unwrap_err();
        assert_eq!(
            err.rejected_metrics().unwrap(),
            &["not_a_real_metric".to_string(), "HDI_42_lower".to_string()]
        );
    }

    #[test]
    fn map_only_selection_skips_secondary() {
        let selection = MetricCatalog::summary().resolve(Some(&["MAP"][..])).unwrap();
        assert!(!selection.needs_secondary());
        assert!(selection.source_columns(SourceSide::Secondary).is_empty());
    }

    #[test]
    fn empty_request_selects_the_whole_catalog() {
        let catalog = MetricCatalog::summary();
        let selection = catalog.resolve(Some(&[] as &[&str])).unwrap();
        assert_eq!(selection, catalog.resolve::<&str>(None).unwrap());
        assert_eq!(selection.len(), 13);
        assert_eq!(selection.names().next(), Some("MAP"));
        assert!(selection.needs_secondary());
    }

    #[test]
    fn custom_catalog_validation() {
        let ok = MetricCatalog::try_new(
            "custom-v1",
            vec![
                MetricDef::mean_of("sb_mean", vec![ColumnRef::primary("pred_ln_sb_best")]),
                MetricDef::float32("lower", ColumnRef::secondary("lo")),
            ],
        )
        .unwrap();
        assert_eq!(ok.version(), "custom-v1");
        assert_eq!(ok.source_specs(SourceSide::Secondary)[0].name, "lo");

        let duplicate = MetricCatalog::try_new(
            "bad",
            vec![
                MetricDef::float32("x", ColumnRef::secondary("a")),
                MetricDef::float32("x", ColumnRef::secondary("b")),
            ],
        );
        assert!(matches!(duplicate, Err(Error::InvalidArgumentError(_))));

        let empty_mean = MetricCatalog::try_new("bad", vec![MetricDef::mean_of("m", vec![])]);
        assert!(matches!(empty_mean, Err(Error::InvalidArgumentError(_))));

        let mismatched = MetricCatalog::try_new(
            "bad",
            vec![MetricDef::new(
                "m",
                MetricType::DerivedMean,
                MetricSource::Column(ColumnRef::primary("a")),
            )],
        );
        assert!(matches!(mismatched, Err(Error::InvalidArgumentError(_))));

        let conflicting_types = MetricCatalog::try_new(
            "bad",
            vec![
                MetricDef::float32("a", ColumnRef::secondary("v")),
                MetricDef::float32_list("b", ColumnRef::secondary("v")),
            ],
        );
        assert!(matches!(conflicting_types, Err(Error::InvalidArgumentError(_))));

        let reserved =
            MetricCatalog::try_new("bad", vec![MetricDef::float32("l", ColumnRef::primary("lat"))]);
        assert!(matches!(reserved, Err(Error::InvalidArgumentError(_))));

        let colliding = MetricCatalog::try_new(
            "bad",
            vec![
                MetricDef::float32("a", ColumnRef::primary("v")),
                MetricDef::float32("b", ColumnRef::secondary("v")),
            ],
        );
        assert!(matches!(colliding, Err(Error::InvalidArgumentError(_))));
    }

    #[test]
    fn catalog_version_parsing() {
        assert_eq!("summary".parse::<CatalogVersion>().unwrap(), CatalogVersion::Summary);
        assert_eq!(" RAW ".parse::<CatalogVersion>().unwrap(), CatalogVersion::Raw);
        assert!("v2".parse::<CatalogVersion>().is_err());
        assert_eq!(CatalogVersion::default().catalog().version(), "summary-v1");
    }
}
