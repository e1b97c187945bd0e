//! Incremental DTW Scorer (spec §4.9) — the central algorithm. Maintains a
//! banded, two-column-resident cost grid between the (fixed) master
//! feature matrix and the (growing) user feature matrix, updating a
//! length-normalized similarity after each new user frame.
//!
//! The full cost matrix is never materialized during streaming; only the
//! last two columns are kept (spec §9 "DTW memory"). A fresh, unbanded
//! full-matrix recomputation is done separately by the Finalizer over a
//! bounded selected window (see `finalizer.rs`).

/// Fixed constant mapping normalized DTW cost to a similarity score in
/// `[0,1]` via `exp(-ALPHA * norm_cost)`. Chosen so that a perfect
/// alignment (cost 0) returns 1.0 and a typical cross-pitch mismatch on
/// 13-coefficient MFCC vectors returns roughly 0.2 (spec §4.9 step 4).
pub const ALPHA: f64 = 0.35;

/// Minimum Sakoe-Chiba band half-width in frames (spec §4.9 "floor").
const BAND_FLOOR: usize = 10;
/// Band half-width as a fraction of `max(m, u)` (spec §4.9 "e.g. 10%").
const BAND_FRACTION: f64 = 0.10;

/// Euclidean distance between two MFCC vectors. `drop_c0` skips
/// coefficient 0 (spec §4.9: "coefficient 0 optionally dropped").
pub fn mfcc_distance(a: &[f32], b: &[f32], drop_c0: bool) -> f64 {
    let start = if drop_c0 { 1 } else { 0 };
    let mut sum = 0.0f64;
    for i in start..a.len().min(b.len()) {
        let d = (a[i] - b[i]) as f64;
        sum += d * d;
    }
    sum.sqrt()
}

fn band_half_width(m: usize, u: usize) -> usize {
    BAND_FLOOR.max((BAND_FRACTION * m.max(u) as f64) as usize)
}

/// Result of folding in one new user frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DtwStep {
    /// Best partial alignment cost in the current (last) column.
    pub best_cost: f64,
    /// Row achieving `best_cost`, used to approximate path length/slope.
    pub best_row: usize,
    /// `best_cost` normalized by `sqrt(path_length)`.
    pub norm_cost: f64,
    /// `overall = exp(-ALPHA * norm_cost)`.
    pub overall: f64,
}

/// Incremental DTW working set for one session.
pub struct IncrementalDtw {
    drop_c0: bool,
    prev_col: Vec<f64>,
    u_count: usize,
    norm_cost_trail: Vec<f64>,
}

impl IncrementalDtw {
    pub fn new(master_len: usize, drop_c0: bool) -> Self {
        Self {
            drop_c0,
            prev_col: vec![f64::INFINITY; master_len.max(1)],
            u_count: 0,
            norm_cost_trail: Vec::new(),
        }
    }

    pub fn frames_processed(&self) -> usize {
        self.u_count
    }

    /// Fold in the newest user MFCC row.
    pub fn step(&mut self, master: &[Vec<f32>], new_user_row: &[f32]) -> DtwStep {
        let m = master.len();
        let j = self.u_count;
        let band = band_half_width(m, j + 1);
        let center = j.min(m.saturating_sub(1));
        let lo = center.saturating_sub(band);
        let hi = (center + band).min(m.saturating_sub(1));

        let mut new_col = vec![f64::INFINITY; m];
        for i in lo..=hi {
            let c = mfcc_distance(&master[i], new_user_row, self.drop_c0);
            let diag = if i > 0 { self.prev_col[i - 1] } else { f64::INFINITY };
            let left = self.prev_col[i];
            let up = if i > 0 { new_col[i - 1] } else { f64::INFINITY };
            let base = if i == 0 && j == 0 {
                0.0
            } else {
                diag.min(left).min(up)
            };
            new_col[i] = c + base;
        }

        let mut best_cost = f64::INFINITY;
        let mut best_row = lo;
        for (i, &v) in new_col.iter().enumerate().take(hi + 1).skip(lo) {
            if v < best_cost {
                best_cost = v;
                best_row = i;
            }
        }

        self.prev_col = new_col;
        self.u_count += 1;

        let path_length = (best_row + j + 1) as f64;
        let norm_cost = if best_cost.is_finite() {
            best_cost / path_length.sqrt()
        } else {
            f64::INFINITY
        };
        let overall = if norm_cost.is_finite() {
            (-ALPHA * norm_cost).exp().clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.norm_cost_trail.push(norm_cost);
        if self.norm_cost_trail.len() > 10 {
            self.norm_cost_trail.remove(0);
        }

        DtwStep {
            best_cost,
            best_row,
            norm_cost,
            overall,
        }
    }

    /// True once the running minimum cost has stabilized: relative change
    /// under 1% across the last 10 recorded normalized costs (spec §4.9
    /// readiness condition).
    pub fn cost_has_stabilized(&self) -> bool {
        if self.norm_cost_trail.len() < 10 {
            return false;
        }
        let first = self.norm_cost_trail[0];
        let last = *self.norm_cost_trail.last().unwrap();
        if !first.is_finite() || !last.is_finite() || first == 0.0 {
            return last == first;
        }
        ((last - first).abs() / first.abs()) < 0.01
    }
}

/// A full, unbanded DTW cost matrix over a bounded window, used by the
/// Finalizer (spec §4.10 step 2: "no banding").
pub struct FullDtwResult {
    pub total_cost: f64,
    pub path_length: usize,
}

/// Compute the anchored minimum-cost DTW path cost between two feature
/// matrices with no Sakoe-Chiba banding.
pub fn full_dtw(a: &[Vec<f32>], b: &[Vec<f32>], drop_c0: bool) -> FullDtwResult {
    let n = a.len();
    let m = b.len();
    if n == 0 || m == 0 {
        return FullDtwResult {
            total_cost: 0.0,
            path_length: 0,
        };
    }

    let mut cost = vec![vec![f64::INFINITY; m]; n];
    let mut steps = vec![vec![0usize; m]; n];

    for i in 0..n {
        for j in 0..m {
            let c = mfcc_distance(&a[i], &b[j], drop_c0);
            if i == 0 && j == 0 {
                cost[i][j] = c;
                steps[i][j] = 1;
            } else {
                let diag = if i > 0 && j > 0 {
                    Some((cost[i - 1][j - 1], steps[i - 1][j - 1]))
                } else {
                    None
                };
                let up = if i > 0 {
                    Some((cost[i - 1][j], steps[i - 1][j]))
                } else {
                    None
                };
                let left = if j > 0 {
                    Some((cost[i][j - 1], steps[i][j - 1]))
                } else {
                    None
                };
                let best = [diag, up, left]
                    .into_iter()
                    .flatten()
                    .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
                if let Some((best_cost, best_steps)) = best {
                    cost[i][j] = c + best_cost;
                    steps[i][j] = best_steps + 1;
                }
            }
        }
    }

    FullDtwResult {
        total_cost: cost[n - 1][m - 1],
        path_length: steps[n - 1][m - 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: f32) -> Vec<f32> {
        vec![v; 13]
    }

    #[test]
    fn identical_sequences_have_zero_cost() {
        let master: Vec<Vec<f32>> = (0..20).map(|i| row(i as f32)).collect();
        let mut dtw = IncrementalDtw::new(master.len(), false);
        let mut last = DtwStep {
            best_cost: 0.0,
            best_row: 0,
            norm_cost: 0.0,
            overall: 0.0,
        };
        for r in &master {
            last = dtw.step(&master, r);
        }
        assert!(last.best_cost.abs() < 1e-6);
        assert!((last.overall - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_sequences_score_lower_than_identical() {
        let master: Vec<Vec<f32>> = (0..20).map(|i| row(i as f32)).collect();
        let mismatched: Vec<Vec<f32>> = (0..20).map(|i| row(i as f32 + 50.0)).collect();

        let mut dtw_same = IncrementalDtw::new(master.len(), false);
        let mut last_same = None;
        for r in &master {
            last_same = Some(dtw_same.step(&master, r));
        }

        let mut dtw_diff = IncrementalDtw::new(master.len(), false);
        let mut last_diff = None;
        for r in &mismatched {
            last_diff = Some(dtw_diff.step(&master, r));
        }

        assert!(last_same.unwrap().overall > last_diff.unwrap().overall);
    }

    #[test]
    fn full_dtw_identical_has_zero_cost() {
        let a: Vec<Vec<f32>> = (0..10).map(|i| row(i as f32)).collect();
        let result = full_dtw(&a, &a, false);
        assert!(result.total_cost.abs() < 1e-6);
        assert_eq!(result.path_length, 10);
    }

    #[test]
    fn stabilization_requires_ten_samples() {
        let master: Vec<Vec<f32>> = (0..5).map(|i| row(i as f32)).collect();
        let mut dtw = IncrementalDtw::new(master.len(), false);
        for r in &master {
            dtw.step(&master, r);
        }
        assert!(!dtw.cost_has_stabilized());
    }
}
