use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use gridcast_catalog::layout::{PRIMARY_FILE, SECONDARY_FILE};
use gridcast_catalog::{CatalogVersion, MetricCatalog};
use gridcast_join::{DuplicateKeyPolicy, JoinOptions};
use gridcast_result::{Error, Result};
use gridcast_storage::{DEFAULT_BATCH_SIZE, LoadOptions};

/// How the primary and secondary tables are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum JoinStrategy {
    /// Join every row once at construction and keep the result.
    #[default]
    Eager,
    /// Keep the tables apart and join only the columns a query needs.
    Lazy,
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinStrategy::Eager => write!(f, "eager"),
            JoinStrategy::Lazy => write!(f, "lazy"),
        }
    }
}

impl FromStr for JoinStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eager" => Ok(JoinStrategy::Eager),
            "lazy" => Ok(JoinStrategy::Lazy),
            other => Err(Error::InvalidArgumentError(format!(
                "unknown join strategy '{other}' (expected 'eager' or 'lazy')"
            ))),
        }
    }
}

/// Options fixed for the lifetime of a [`ForecastEngine`](crate::ForecastEngine).
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub strategy: JoinStrategy,
    /// Built-in catalog to serve. Ignored when a custom catalog is set.
    pub catalog: CatalogVersion,
    pub custom_catalog: Option<Arc<MetricCatalog>>,
    /// Rows per batch when reading Parquet sources, and so the streaming
    /// granularity of an opened engine. Tables handed to
    /// [`ForecastEngine::from_tables`](crate::ForecastEngine::from_tables)
    /// keep their own batching; there it is only validated.
    pub batch_size: usize,
    pub duplicate_keys: DuplicateKeyPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strategy: JoinStrategy::default(),
            catalog: CatalogVersion::default(),
            custom_catalog: None,
            batch_size: DEFAULT_BATCH_SIZE,
            duplicate_keys: DuplicateKeyPolicy::default(),
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: JoinStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_catalog(mut self, catalog: CatalogVersion) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_custom_catalog(mut self, catalog: MetricCatalog) -> Self {
        self.custom_catalog = Some(Arc::new(catalog));
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.load_options().validate()
    }

    pub(crate) fn load_options(&self) -> LoadOptions {
        LoadOptions::default().with_batch_size(self.batch_size)
    }

    pub(crate) fn join_options(&self) -> JoinOptions {
        JoinOptions::default().with_duplicate_keys(self.duplicate_keys)
    }

    pub(crate) fn resolve_catalog(&self) -> Arc<MetricCatalog> {
        match &self.custom_catalog {
            Some(catalog) => Arc::clone(catalog),
            None => Arc::new(self.catalog.catalog()),
        }
    }
}

/// Locations of the two source files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcePaths {
    pub primary: PathBuf,
    pub secondary: PathBuf,
}

impl SourcePaths {
    pub fn new(primary: impl Into<PathBuf>, secondary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// The default file names (`preds_001.parquet`, `preds_001_90_hdi.parquet`)
    /// inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(PRIMARY_FILE), dir.join(SECONDARY_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parsing() {
        assert_eq!("eager".parse::<JoinStrategy>().unwrap(), JoinStrategy::Eager);
        assert_eq!(" Lazy".parse::<JoinStrategy>().unwrap(), JoinStrategy::Lazy);
        assert!(matches!(
            "hybrid".parse::<JoinStrategy>(),
            Err(Error::InvalidArgumentError(_))
        ));
        assert_eq!(JoinStrategy::Lazy.to_string(), "lazy");
    }

    #[test]
    fn options_builders() {
        let options = EngineOptions::new()
            .with_strategy(JoinStrategy::Lazy)
            .with_catalog(CatalogVersion::Raw)
            .with_batch_size(128)
            .with_duplicate_keys(DuplicateKeyPolicy::Reject);
        assert_eq!(options.strategy, JoinStrategy::Lazy);
        assert_eq!(options.batch_size, 128);
        assert_eq!(options.load_options().batch_size, 128);
        assert_eq!(options.join_options().duplicate_keys, DuplicateKeyPolicy::Reject);
        assert_eq!(options.resolve_catalog().version(), "raw-v1");
        assert!(options.validate().is_ok());

        assert_eq!(EngineOptions::new().batch_size, DEFAULT_BATCH_SIZE);
        assert!(EngineOptions::new().with_batch_size(0).validate().is_err());
    }

    #[test]
    fn custom_catalog_overrides_version() {
        let options = EngineOptions::new()
            .with_catalog(CatalogVersion::Raw)
            .with_custom_catalog(MetricCatalog::summary());
        assert_eq!(options.resolve_catalog().version(), "summary-v1");
    }

    #[test]
    fn source_paths_from_dir() {
        let paths = SourcePaths::from_dir("/data");
        assert_eq!(paths.primary, PathBuf::from("/data/preds_001.parquet"));
        assert_eq!(paths.secondary, PathBuf::from("/data/preds_001_90_hdi.parquet"));
    }
}
