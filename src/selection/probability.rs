//! Recency-biased sampling of vote options.
//!
//! Candidates are indexed from least recently played (0) to most recently
//! played (n - 1). `randomness` in `[0, 10]` shapes how strongly the draw
//! favours the low indices:
//!
//! * `0` - uniform over the `k` least recently played entries only.
//! * `1..=4` - a trapezoid: full weight up to a window start, a linear ramp down
//!   to zero at the window stop. The window widens as randomness grows.
//! * `5..=10` - linear decay over every entry, flat at `10`.
//!
//! Draws are integers in `[0, 1000)` looked up in a cumulative table.

use log::{debug, trace, warn};
use rand::Rng;

pub const TABLE_SCALE: f64 = 1000.0;
pub const MAX_ATTEMPTS: usize = 100;

/// Per-entry selection weight, normalised so the weights sum to `TABLE_SCALE`.
pub fn probabilities(n: usize, k: usize, randomness: u8) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let k = k.clamp(1, n);
    let max = n as f64;
    let mid = k as f64;
    let mut prob = vec![0.0; n];

    match randomness.min(10) {
        0 => {
            for p in prob.iter_mut().take(k) {
                *p = max;
            }
        }
        r @ 1..=4 => {
            let factor = (5.0 - r as f64) / 5.0;
            let window_start = factor * mid;
            let window_stop = mid + (1.0 - factor) * (max - mid);
            let width = window_stop - window_start;
            let gradient = max / width;
            let triangle = width * max * 0.5;
            // Area of the ramp between x and the window stop.
            let ramp = |x: f64| (window_stop - x) * (window_stop - x) * gradient * 0.5;

            for (i, p) in prob.iter_mut().enumerate() {
                let x = i as f64;
                if x + 1.0 < window_start {
                    *p = max;
                } else if x > window_stop {
                    break;
                } else if x < window_start {
                    // Block straddling the window start.
                    *p = (window_start - x) * max;
                    if x + 1.0 > window_stop {
                        *p += triangle;
                    } else {
                        *p += triangle - ramp(x + 1.0);
                    }
                } else if x + 1.0 > window_stop {
                    *p = ramp(x);
                } else {
                    *p = ramp(x) - ramp(x + 1.0);
                }
            }
        }
        r => {
            let factor = (10.0 - r as f64) / 5.0;
            let small_triangle = 0.5 * factor;
            let base = max * (1.0 - factor);
            for (i, p) in prob.iter_mut().enumerate() {
                *p = (max * 2.0 - i as f64 * 2.0 - 1.0) * small_triangle + base;
            }
        }
    }

    let sum: f64 = prob.iter().sum();
    for p in prob.iter_mut() {
        *p = *p * TABLE_SCALE / sum;
    }
    prob
}

/// Cumulative probability table: entry `i` is the sum of weights `0..=i`.
pub fn build_probability_table(n: usize, k: usize, randomness: u8) -> Vec<f64> {
    let mut running = 0.0;
    probabilities(n, k, randomness)
        .into_iter()
        .map(|p| {
            running += p;
            running
        })
        .collect()
}

/// First bucket whose cumulative value exceeds `value`.
pub fn find_in_table(value: f64, table: &[f64]) -> Option<usize> {
    table.iter().position(|&bound| value < bound)
}

/// Draw up to `k` distinct indices in `[0, n)`. A slot that cannot find a fresh
/// index within `MAX_ATTEMPTS` draws is skipped, so the result may be short.
pub fn sample_indices<R: Rng + ?Sized>(
    n: usize,
    k: usize,
    randomness: u8,
    rng: &mut R,
) -> Vec<usize> {
    let k = k.min(n);
    if k == n {
        debug!("No flexibility in vote options, taking all {} candidates", n);
        return (0..n).collect();
    }

    let table = build_probability_table(n, k, randomness);
    let mut selection: Vec<usize> = Vec::with_capacity(k);

    for slot in 0..k {
        let mut found = false;
        for _ in 0..MAX_ATTEMPTS {
            let draw = rng.gen_range(0..TABLE_SCALE as u32);
            let hit = find_in_table(draw as f64, &table);
            trace!("Draw {} -> {:?}", draw, hit);
            if let Some(index) = hit {
                if !selection.contains(&index) {
                    selection.push(index);
                    found = true;
                    break;
                }
            }
        }
        if !found {
            warn!(
                "No unused candidate found for option slot {} after {} attempts, skipping it",
                slot + 1,
                MAX_ATTEMPTS
            );
        }
    }

    selection
}
