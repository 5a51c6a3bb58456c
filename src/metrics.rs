//! Pure statistical building blocks shared by the reporters. No I/O here;
//! everything operates on record slices already fetched from storage.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

pub fn grouped_count<T, K, F>(records: &[T], key_fn: F) -> HashMap<K, usize>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut counts = HashMap::new();
    for record in records {
        *counts.entry(key_fn(record)).or_insert(0) += 1;
    }
    counts
}

/// Arithmetic mean per group. A group with no records is absent from the
/// result, never reported as zero: "no data" must not read as "zero
/// performance".
pub fn grouped_average<T, K, KF, VF>(records: &[T], key_fn: KF, value_fn: VF) -> HashMap<K, f64>
where
    K: Eq + Hash,
    KF: Fn(&T) -> K,
    VF: Fn(&T) -> f64,
{
    let mut sums: HashMap<K, (f64, usize)> = HashMap::new();
    for record in records {
        let entry = sums.entry(key_fn(record)).or_insert((0.0, 0));
        entry.0 += value_fn(record);
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect()
}

/// Records whose timestamp falls at or after `since`.
pub fn window_filter<T, F>(records: &[T], timestamp_fn: F, since: DateTime<Utc>) -> Vec<&T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    records
        .iter()
        .filter(|record| timestamp_fn(record) >= since)
        .collect()
}

/// Zero-denominator-safe ratio, used for completion rates and per-user
/// averages throughout the reporters.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

pub fn mean(values: &[f64]) -> f64 {
    safe_ratio(values.iter().sum(), values.len() as f64)
}

/// Clamps a percentage-scale value into [0, 100]. Out-of-range or non-finite
/// source values are tolerated here rather than propagated as NaN.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn grouped_count_tallies_by_key() {
        let records = vec!["a", "b", "a", "a"];
        let counts = grouped_count(&records, |r| r.to_string());
        assert_eq!(counts["a"], 3);
        assert_eq!(counts["b"], 1);
    }

    #[test]
    fn grouped_average_omits_empty_groups() {
        let records: Vec<(&str, f64)> = vec![("x", 10.0), ("x", 20.0)];
        let averages = grouped_average(&records, |r| r.0.to_string(), |r| r.1);
        assert_eq!(averages.len(), 1);
        assert!((averages["x"] - 15.0).abs() < 1e-9);
        assert!(!averages.contains_key("y"));
    }

    #[test]
    fn window_filter_keeps_boundary_timestamp() {
        let now = Utc::now();
        let records = vec![now - Duration::days(10), now - Duration::days(3), now];
        let since = now - Duration::days(3);
        let kept = window_filter(&records, |t| *t, since);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn safe_ratio_guards_zero_denominator() {
        assert_eq!(safe_ratio(5.0, 0.0), 0.0);
        assert_eq!(safe_ratio(0.0, 0.0), 0.0);
        assert_eq!(safe_ratio(5.0, -1.0), 0.0);
        assert!((safe_ratio(1.0, 4.0) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert!((mean(&[2.0, 4.0]) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_percent_bounds_and_nan() {
        assert_eq!(clamp_percent(150.0), 100.0);
        assert_eq!(clamp_percent(-5.0), 0.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(42.0), 42.0);
    }
}
