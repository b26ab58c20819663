//! Joined output records.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Value of one metric in one record.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Float32(f32),
    /// Derived metrics, computed in double precision.
    Float64(f64),
    Float32List(Vec<Option<f32>>),
}

impl MetricValue {
    /// Scalar value widened to `f64`; `None` for lists.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Float32(v) => Some(f64::from(*v)),
            MetricValue::Float64(v) => Some(*v),
            MetricValue::Float32List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Option<f32>]> {
        match self {
            MetricValue::Float32List(values) => Some(values),
            _ => None,
        }
    }
}

/// Ordered metric name to value mapping of one record.
///
/// Every selected metric is present; a `None` value is a null.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricValues(Vec<(Arc<str>, Option<MetricValue>)>);

impl MetricValues {
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, name: Arc<str>, value: Option<MetricValue>) {
        self.0.push((name, value));
    }

    /// Value of `name`; `None` when the metric is null or was not selected.
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.0
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n.as_ref() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|(n, _)| n.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&MetricValue>)> + '_ {
        self.0.iter().map(|(n, v)| (n.as_ref(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for MetricValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name.as_ref(), value)?;
        }
        map.end()
    }
}

/// One primary row, its joined secondary values, and the selected metrics.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ForecastRecord {
    #[serde(rename = "priogrid_id")]
    pub cell_id: i64,
    #[serde(rename = "month_id")]
    pub period_id: i64,
    #[serde(rename = "country_id")]
    pub region: Option<i64>,
    pub lat: Option<f32>,
    pub lon: Option<f32>,
    pub row: Option<i64>,
    pub col: Option<i64>,
    #[serde(rename = "values")]
    pub metrics: MetricValues,
}

impl ForecastRecord {
    /// Composite key as `(period, cell)`.
    pub fn key(&self) -> (i64, i64) {
        (self.period_id, self.cell_id)
    }
}
