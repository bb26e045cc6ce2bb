//! The sliding-window N-out-of-M cap shared by the standalone filter node
//! and rerank's own N-out-M pass (spec.md §4.3.3 / §4.3.4): within any `m`
//! consecutive *kept* outputs, at most `n` may share a key value. Candidates
//! whose key is absent are never constrained and never occupy a window
//! slot — there's nothing to cap them against.

use std::collections::{HashMap, VecDeque};

pub fn sliding_window_filter<T>(
    items: Vec<T>,
    n: usize,
    m: usize,
    key_fn: impl Fn(&T) -> Option<String>,
) -> Vec<T> {
    if n == 0 || m == 0 || n >= m {
        return items;
    }

    let mut window: VecDeque<String> = VecDeque::with_capacity(m);
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut result = Vec::with_capacity(items.len());

    for item in items {
        let key = key_fn(&item);
        let keep = match &key {
            None => true,
            Some(k) => counts.get(k).copied().unwrap_or(0) < n,
        };

        if keep {
            if let Some(k) = key {
                if window.len() == m {
                    if let Some(evicted) = window.pop_front() {
                        if let Some(c) = counts.get_mut(&evicted) {
                            *c -= 1;
                            if *c == 0 {
                                counts.remove(&evicted);
                            }
                        }
                    }
                }
                *counts.entry(k.clone()).or_insert(0) += 1;
                window.push_back(k);
            }
            result.push(item);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_every_contiguous_window_of_m() {
        let authors = ["A", "A", "A", "B", "C", "A", "D", "E", "A", "A"];
        let result = sliding_window_filter(authors.to_vec(), 1, 5, |a| Some(a.to_string()));
        assert_eq!(result, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn invalid_config_passes_through() {
        let items = vec!["A", "A", "A"];
        assert_eq!(sliding_window_filter(items.clone(), 2, 2, |s| Some(s.to_string())), items);
        assert_eq!(sliding_window_filter(items.clone(), 0, 5, |s| Some(s.to_string())), items);
    }
}
