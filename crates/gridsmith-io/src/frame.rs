//! Column extraction helpers.
//!
//! The numeric fallbacks work on plain vectors; these helpers are the only
//! place that turns polars columns into them and back.

use gridsmith_core::{GridError, GridResult};
use polars::prelude::*;

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().contains(&name)
}

pub fn require_column(df: &DataFrame, name: &str) -> GridResult<()> {
    if has_column(df, name) {
        Ok(())
    } else {
        Err(GridError::missing_column(name))
    }
}

/// Numeric column as `f64`; nulls become NaN.
pub fn column_f64(df: &DataFrame, name: &str) -> GridResult<Vec<f64>> {
    require_column(df, name)?;
    let series = df.column(name)?.cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Numeric column with nulls preserved.
pub fn column_opt_f64(df: &DataFrame, name: &str) -> GridResult<Vec<Option<f64>>> {
    require_column(df, name)?;
    let series = df.column(name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Flag column as `bool`; numeric columns count non-zero as true, nulls as false.
pub fn column_bool(df: &DataFrame, name: &str) -> GridResult<Vec<bool>> {
    require_column(df, name)?;
    let series = df.column(name)?;
    let flags = if series.dtype() == &DataType::Boolean {
        series.clone()
    } else {
        series.cast(&DataType::Float64)?.not_equal(0.0)?.into_series()
    };
    Ok(flags
        .bool()?
        .into_iter()
        .map(|v| v.unwrap_or(false))
        .collect())
}

/// Timestamp column as epoch values in its own time unit (or raw integers).
pub fn column_i64(df: &DataFrame, name: &str) -> GridResult<Vec<Option<i64>>> {
    require_column(df, name)?;
    let series = df.column(name)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

/// Row-major matrix of the given numeric columns; nulls become NaN.
pub fn rows_f64<S: AsRef<str>>(df: &DataFrame, names: &[S]) -> GridResult<Vec<Vec<f64>>> {
    let columns = names
        .iter()
        .map(|name| column_f64(df, name.as_ref()))
        .collect::<GridResult<Vec<_>>>()?;
    Ok((0..df.height())
        .map(|row| columns.iter().map(|col| col[row]).collect())
        .collect())
}

/// Add or replace a column.
pub fn set_column(df: &mut DataFrame, series: Series) -> GridResult<()> {
    df.with_column(series)?;
    Ok(())
}

/// Rows of `df` at `indices`, in that order.
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> GridResult<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx_ca = IdxCa::new("row_idx", idx.as_slice());
    Ok(df.take(&idx_ca)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_bool_accepts_numeric_flags() {
        let df = df![
            "flag" => &[0i64, 1, 2],
            "truth" => &[true, false, true],
        ]
        .unwrap();
        assert_eq!(column_bool(&df, "flag").unwrap(), vec![false, true, true]);
        assert_eq!(column_bool(&df, "truth").unwrap(), vec![true, false, true]);
    }

    #[test]
    fn column_f64_maps_nulls_to_nan() {
        let df = df!["v" => &[Some(1.0f64), None, Some(3.0)]].unwrap();
        let values = column_f64(&df, "v").unwrap();
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert_eq!(column_opt_f64(&df, "v").unwrap()[1], None);
    }

    #[test]
    fn missing_column_is_validation_error() {
        let df = df!["v" => &[1.0f64]].unwrap();
        let err = column_f64(&df, "consumption").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rows_f64_is_row_major() {
        let df = df!["a" => &[1.0f64, 2.0], "b" => &[3i64, 4]].unwrap();
        let rows = rows_f64(&df, &["a", "b"]).unwrap();
        assert_eq!(rows, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
    }

    #[test]
    fn take_rows_preserves_order() {
        let df = df!["v" => &[10i64, 20, 30]].unwrap();
        let taken = take_rows(&df, &[2, 0]).unwrap();
        assert_eq!(column_i64(&taken, "v").unwrap(), vec![Some(30), Some(10)]);
    }
}
