//! Shared numeric/grouping helpers used by the Issue Detector, API Discovery
//! Engine, and Query Monitor.

use std::collections::HashMap;
use std::hash::Hash;

/// `percentile(sorted, p) = sorted[max(0, ceil(n*p/100)-1)]`; 0 on empty input.
/// `sorted` must already be sorted ascending.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len() as f64;
    let raw_idx = (n * p / 100.0).ceil() as i64 - 1;
    let idx = raw_idx.max(0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Groups `items` by `key_fn`, preserving the order in which each distinct
/// key was first encountered (not insertion-order-unstable `HashMap`
/// iteration), since detectors' "first 3 evidence"/tie-break rules depend on
/// encounter order. `T` is expected to be a cheap `Copy` type — typically a
/// `&RuntimeEvent` reference — so groups own plain `Vec<T>`s rather than a
/// second layer of references.
pub fn group_by_ordered<T, K, F>(items: &[T], mut key_fn: F) -> Vec<(K, Vec<T>)>
where
    T: Copy,
    K: Eq + Hash + Clone,
    F: FnMut(T) -> K,
{
    let mut order: Vec<(K, Vec<T>)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();
    for &item in items {
        let key = key_fn(item);
        match index.get(&key) {
            Some(&i) => order[i].1.push(item),
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, vec![item]));
            }
        }
    }
    order
}

/// `true` if any 2-second (default `window_ms`) sliding window over sorted
/// ascending `timestamps` contains more than `threshold` entries. Stops at
/// the first trigger.
pub fn sliding_window_any_trigger(timestamps: &[i64], window_ms: i64, threshold: usize) -> bool {
    if timestamps.is_empty() {
        return false;
    }
    let mut window_start = timestamps[0];
    let mut window_count = 1usize;
    for &ts in &timestamps[1..] {
        if ts - window_start <= window_ms {
            window_count += 1;
        } else {
            window_start = ts;
            window_count = 1;
        }
        if window_count > threshold {
            return true;
        }
    }
    false
}

/// Returns the `[start, end]` index ranges (into `timestamps`) of every
/// non-overlapping triggering window, advancing past each triggering window
/// before resuming the scan (advances past the window to avoid
/// overlapping duplicates").
pub fn sliding_window_segments(timestamps: &[i64], window_ms: i64, threshold: usize) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut i = 0usize;
    while i < timestamps.len() {
        let mut window_start = timestamps[i];
        let mut window_count = 1usize;
        let mut triggered_at = None;
        let mut j = i + 1;
        while j < timestamps.len() {
            if timestamps[j] - window_start <= window_ms {
                window_count += 1;
            } else {
                window_start = timestamps[j];
                window_count = 1;
            }
            if window_count > threshold {
                triggered_at = Some(j);
                break;
            }
            j += 1;
        }
        match triggered_at {
            Some(j) => {
                segments.push((i, j));
                i = j + 1;
            }
            None => break,
        }
    }
    segments
}

/// Count-only form of [`sliding_window_segments`].
pub fn sliding_window_trigger_count(timestamps: &[i64], window_ms: i64, threshold: usize) -> usize {
    sliding_window_segments(timestamps, window_ms, threshold).len()
}

/// Renders a `serde`-tagged enum value back to its wire string (e.g.
/// `DbSource::BetterSqlite3` -> `"better-sqlite3"`) for filter/grouping
/// comparisons that must match what the client actually sent rather than
/// Rust's `Debug` spelling.
pub fn wire_str<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_boundary_cases() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[], 0.0), 0.0);
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 0.0), 1.0);
    }

    #[test]
    fn percentile_matches_worked_example() {
        let sorted = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&sorted, 100.0), 50.0);
        assert_eq!(percentile(&sorted, 50.0), 30.0);
    }

    #[test]
    fn group_by_ordered_preserves_first_seen_order() {
        let items = vec![3, 1, 3, 2, 1];
        let groups = group_by_ordered(&items, |x| x);
        let keys: Vec<i32> = groups.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![3, 1, 2]);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn sliding_window_triggers_on_dense_burst() {
        let ts: Vec<i64> = (0..8).map(|i| i * 100).collect();
        assert!(sliding_window_any_trigger(&ts, 2000, 5));
        let sparse: Vec<i64> = (0..4).map(|i| i * 100).collect();
        assert!(!sliding_window_any_trigger(&sparse, 2000, 5));
    }

    #[test]
    fn sliding_window_trigger_count_advances_past_triggered_windows() {
        let mut ts: Vec<i64> = (0..8).map(|i| i * 100).collect();
        ts.extend((0..8).map(|i| 100_000 + i * 100));
        assert_eq!(sliding_window_trigger_count(&ts, 2000, 5), 2);
    }
}
