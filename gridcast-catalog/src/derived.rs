//! Derived metric computation.
//!
//! Derived metrics are pure functions of one row's source values. The
//! projector calls them only for metrics a query actually selected.

use arrow::array::{Array, AsArray, Float64Array, Float64Builder, ListArray};
use arrow::datatypes::Float32Type;
use gridcast_result::{Error, Result};

/// Mean over every non-null element of the component lists.
///
/// Absent lists and null elements are skipped. Returns `None` when no element
/// contributes, i.e. every list is empty or absent. Accumulates in `f64`.
///
/// ```
/// use gridcast_catalog::mean_of_components;
///
/// let map = mean_of_components([
///     Some(vec![Some(1.0_f32), Some(2.0)]),
///     Some(vec![Some(3.0)]),
///     Some(vec![]),
/// ]);
/// assert_eq!(map, Some(2.0));
/// ```
pub fn mean_of_components<I, L>(components: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<L>>,
    L: IntoIterator<Item = Option<f32>>,
{
    let mut sum = 0.0_f64;
    let mut count = 0_usize;
    for value in components.into_iter().flatten().flatten().flatten() {
        sum += f64::from(value);
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

/// Row-wise [`mean_of_components`] over aligned list columns.
///
/// Every column must hold `f32` items and have the same length.
pub fn mean_of_list_columns(columns: &[&ListArray]) -> Result<Float64Array> {
    let Some(first) = columns.first() else {
        return Err(Error::Internal(
            "derived mean requires at least one list column".to_string(),
        ));
    };
    let len = first.len();

    let mut items = Vec::with_capacity(columns.len());
    for column in columns {
        if column.len() != len {
            return Err(Error::Internal(format!(
                "derived mean inputs differ in length ({} vs {len})",
                column.len()
            )));
        }
        let values = column.values().as_primitive_opt::<Float32Type>().ok_or_else(|| {
            Error::Internal(format!(
                "derived mean expects float32 list items, found {}",
                column.value_type()
            ))
        })?;
        items.push(values);
    }

    let mut builder = Float64Builder::with_capacity(len);
    for row in 0..len {
        let mean = mean_of_components(columns.iter().zip(&items).map(|(column, values)| {
            column.is_valid(row).then(|| {
                let offsets = column.value_offsets();
                let start = offsets[row] as usize;
                let end = offsets[row + 1] as usize;
                (start..end).map(move |i| values.is_valid(i).then(|| values.value(i)))
            })
        }));
        builder.append_option(mean);
    }
    Ok(builder.finish())
}
