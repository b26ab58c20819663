use gridcast_scan::RowFilter;

/// One forecast query: optional allow-lists plus an optional metric list.
///
/// Omitted allow-lists do not constrain; an explicit empty allow-list
/// matches no rows. Omitting `metrics`, or passing an empty list, selects
/// every catalog metric.
///
/// ```
/// use gridcast::ForecastQuery;
///
/// let query = ForecastQuery::new()
///     .periods([409, 410])
///     .cells([62356, 81761])
///     .metrics(["MAP"]);
/// assert_eq!(query.metric_names().unwrap(), ["MAP".to_string()]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForecastQuery {
    filter: RowFilter,
    metrics: Option<Vec<String>>,
}

impl ForecastQuery {
    /// A query for every row and every metric.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn periods<I: IntoIterator<Item = i64>>(mut self, periods: I) -> Self {
        self.filter = self.filter.with_periods(periods);
        self
    }

    pub fn cells<I: IntoIterator<Item = i64>>(mut self, cells: I) -> Self {
        self.filter = self.filter.with_cells(cells);
        self
    }

    pub fn regions<I: IntoIterator<Item = i64>>(mut self, regions: I) -> Self {
        self.filter = self.filter.with_regions(regions);
        self
    }

    pub fn metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(&self) -> &RowFilter {
        &self.filter
    }

    pub fn metric_names(&self) -> Option<&[String]> {
        self.metrics.as_deref()
    }
}
