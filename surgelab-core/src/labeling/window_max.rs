//! Forward sliding-window maximum.
//!
//! For each index `i`, the maximum of `values[j]` over `i < j <= i + window`,
//! clipped at the end of the slice. NaN entries are skipped; a range with no
//! valid value yields `None`.
//!
//! [`forward_max`] walks the slice backwards with a monotonic deque of
//! candidate indices (values strictly decreasing front to back), so each
//! index is pushed and popped at most once: O(n) regardless of window.
//! [`forward_max_naive`] rescans every window and exists as the reference
//! implementation for tests and benchmarks.

use std::collections::VecDeque;

/// Linear-time forward window maximum.
pub fn forward_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut out = vec![None; n];
    let mut deque: VecDeque<usize> = VecDeque::with_capacity(window.min(n));

    for i in (0..n).rev() {
        // Deque holds candidates from (i, n); drop those beyond i + window.
        let horizon = i.saturating_add(window);
        while let Some(&front) = deque.front() {
            if front > horizon {
                deque.pop_front();
            } else {
                break;
            }
        }

        out[i] = deque.front().map(|&j| values[j]);

        let v = values[i];
        if v.is_nan() {
            continue;
        }
        // Equal values are evicted: the newer index stays in range longer.
        while let Some(&back) = deque.back() {
            if values[back] <= v {
                deque.pop_back();
            } else {
                break;
            }
        }
        deque.push_back(i);
    }

    out
}

/// Quadratic-in-window reference implementation.
pub fn forward_max_naive(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let end = i.saturating_add(window).min(n.saturating_sub(1));
            if end <= i {
                return None;
            }
            values[i + 1..=end]
                .iter()
                .copied()
                .filter(|v| !v.is_nan())
                .fold(None, |acc: Option<f64>, v| match acc {
                    Some(m) if m >= v => Some(m),
                    _ => Some(v),
                })
        })
        .collect()
}

/// Number of future rows actually visible to index `i` in a slice of length `n`.
#[inline]
pub fn visible_ahead(i: usize, n: usize, window: usize) -> usize {
    (n - 1 - i).min(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_max_excludes_current_index() {
        let values = [5.0, 1.0, 2.0, 3.0];
        let out = forward_max(&values, 2);
        assert_eq!(out, vec![Some(2.0), Some(3.0), Some(3.0), None]);
    }

    #[test]
    fn forward_max_clips_at_series_end() {
        let values = [1.0, 9.0, 4.0];
        let out = forward_max(&values, 10);
        assert_eq!(out, vec![Some(9.0), Some(4.0), None]);
    }

    #[test]
    fn forward_max_window_one_is_next_value() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        let out = forward_max(&values, 1);
        assert_eq!(out, vec![Some(1.0), Some(4.0), Some(1.0), Some(5.0), None]);
    }

    #[test]
    fn forward_max_skips_nan() {
        let values = [1.0, f64::NAN, 2.0, f64::NAN, f64::NAN];
        let out = forward_max(&values, 2);
        assert_eq!(out, vec![Some(2.0), Some(2.0), None, None, None]);
    }

    #[test]
    fn forward_max_handles_ties() {
        let values = [0.0, 7.0, 7.0, 1.0, 1.0];
        let out = forward_max(&values, 2);
        assert_eq!(out, vec![Some(7.0), Some(7.0), Some(1.0), Some(1.0), None]);
    }

    #[test]
    fn forward_max_evicts_expired_maximum() {
        // The 10 at index 1 is only visible to index 0.
        let values = [0.0, 10.0, 0.0, 2.0, 3.0];
        let out = forward_max(&values, 2);
        assert_eq!(out, vec![Some(10.0), Some(2.0), Some(3.0), Some(3.0), None]);
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(forward_max(&[], 3).is_empty());
        assert_eq!(forward_max(&[1.0], 3), vec![None]);
        assert_eq!(forward_max_naive(&[1.0], 3), vec![None]);
    }

    #[test]
    fn deque_matches_naive_on_sawtooth() {
        let values: Vec<f64> = (0..200)
            .map(|i| ((i * 37) % 23) as f64 + if i % 11 == 0 { f64::NAN } else { 0.0 })
            .collect();
        for window in [1, 2, 3, 7, 15, 50, 300] {
            assert_eq!(
                forward_max(&values, window),
                forward_max_naive(&values, window),
                "window={window}"
            );
        }
    }

    #[test]
    fn huge_window_does_not_overflow() {
        let values = [1.0, 2.0, 3.0];
        assert_eq!(forward_max(&values, usize::MAX), vec![Some(3.0), Some(3.0), None]);
        assert_eq!(forward_max_naive(&values, usize::MAX), vec![Some(3.0), Some(3.0), None]);
    }

    #[test]
    fn visible_ahead_counts_truncated_rows() {
        assert_eq!(visible_ahead(0, 20, 10), 10);
        assert_eq!(visible_ahead(15, 20, 10), 4);
        assert_eq!(visible_ahead(19, 20, 10), 0);
    }
}
