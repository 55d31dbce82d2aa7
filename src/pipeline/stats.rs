//! Column statistics and value conversion helpers shared by the stages.

use crate::error::Result;
use polars::prelude::*;
use std::collections::BTreeMap;

/// Numeric column values as `f64`, nulls preserved.
pub fn float_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Categorical column values as strings, nulls preserved.
pub fn string_values(column: &Column) -> Result<Vec<Option<String>>> {
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_owned))
        .collect())
}

pub fn float_column(name: &PlSmallStr, values: Vec<Option<f64>>) -> Column {
    Column::from(Series::new(name.clone(), values))
}

pub fn string_column(name: &PlSmallStr, values: Vec<Option<String>>) -> Column {
    Column::from(Series::new(name.clone(), values))
}

/// Non-null values, sorted ascending.
pub fn present_sorted(values: &[Option<f64>]) -> Vec<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    present.sort_by(f64::total_cmp);
    present
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Quantile with linear interpolation between closest ranks. `sorted` must be sorted.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q.clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let (a, b) = (*sorted.get(lo)?, *sorted.get(hi)?);
    Some(a + (b - a) * (pos - lo as f64))
}

pub fn median(sorted: &[f64]) -> Option<f64> {
    quantile(sorted, 0.5)
}

/// Q1 and Q3.
pub fn quartiles(sorted: &[f64]) -> Option<(f64, f64)> {
    Some((quantile(sorted, 0.25)?, quantile(sorted, 0.75)?))
}

/// Most frequent value; ties go to the smallest. `sorted` must be sorted.
pub fn mode_f64(sorted: &[f64]) -> Option<f64> {
    let mut best: Option<(f64, usize)> = None;
    let mut iter = sorted.iter().copied().peekable();
    while let Some(value) = iter.next() {
        let mut count = 1;
        while iter.next_if(|next| next.total_cmp(&value).is_eq()).is_some() {
            count += 1;
        }
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v)
}

/// Most frequent string; ties go to the lexicographically smallest.
pub fn mode_str<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v)
}

/// Distinct values in first-seen order, nulls skipped.
pub fn first_seen(values: &[Option<String>]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for v in values.iter().flatten() {
        if !seen.contains(&v.as_str()) {
            seen.push(v.as_str());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!(close(quantile(&sorted, 0.25).unwrap(), 1.75));
        assert!(close(median(&sorted).unwrap(), 2.5));
        assert!(close(quantile(&sorted, 1.0).unwrap(), 4.0));
        assert!(quantile(&[], 0.5).is_none());
        assert!(close(median(&[7.0]).unwrap(), 7.0));
    }

    #[test]
    fn test_population_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(population_std(&values).unwrap(), 2.0));
        assert!(close(mean(&values).unwrap(), 5.0));
    }

    #[test]
    fn test_mode_ties_go_to_smallest() {
        assert_eq!(mode_f64(&[1.0, 1.0, 2.0, 2.0, 3.0]), Some(1.0));
        assert_eq!(mode_f64(&[1.0, 2.0, 2.0]), Some(2.0));
        assert_eq!(mode_f64(&[]), None);
        assert_eq!(mode_str(["b", "a", "b", "a"]), Some("a"));
        assert_eq!(mode_str(["x", "y", "y"]), Some("y"));
    }

    #[test]
    fn test_first_seen_order() {
        let values = vec![
            Some("red".to_owned()),
            None,
            Some("blue".to_owned()),
            Some("red".to_owned()),
        ];
        assert_eq!(first_seen(&values), vec!["red", "blue"]);
    }

    #[test]
    fn test_float_values_casts_integers() {
        let col = Column::from(Series::new("n".into(), vec![Some(1i32), None, Some(3)]));
        assert_eq!(float_values(&col).unwrap(), vec![Some(1.0), None, Some(3.0)]);
    }
}
