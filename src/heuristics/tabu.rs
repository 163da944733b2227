//! Tabu search for MEWCP.
//!
//! A move swaps the selected vertex of one partition for another vertex of the
//! same partition. Every vertex keeps two running sums:
//! - `sum_in[v]`: total weight between `v` and the selected set,
//! - `sum_out[v]`: total weight between `v` and the unselected vertices,
//!
//! so a swap is valued in O(1) and applied in O(n). Two short-term memories
//! stop the search from undoing recent moves: a vertex that just left may not
//! re-enter for `tabu_in` iterations, and a vertex that just entered may not
//! leave for `tabu_out` iterations.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::instance::WeightModel;
use crate::solution::Solution;
use crate::EPSILON;

/// Tabu search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabuConfig {
    pub max_iterations: usize,
    /// Iterations a removed vertex stays out
    pub tabu_in: usize,
    /// Iterations an inserted vertex stays in
    pub tabu_out: usize,
    /// Consecutive non-improving iterations before giving up
    pub max_worsening: usize,
    pub epsilon: f64,
    /// Keep the objective of every iteration in the result
    pub record_trajectory: bool,
}

impl Default for TabuConfig {
    fn default() -> Self {
        TabuConfig {
            max_iterations: 10_000,
            tabu_in: 8,
            tabu_out: 1,
            max_worsening: 1000,
            epsilon: EPSILON,
            record_trajectory: false,
        }
    }
}

/// Current selection with its running sums and tabu markers
#[derive(Debug, Clone)]
pub struct TabuState {
    selection: Vec<usize>,
    selected: Vec<bool>,
    sum_in: Vec<f64>,
    sum_out: Vec<f64>,
    /// Iteration at which each vertex last entered the selection
    entered_at: Vec<Option<usize>>,
    /// Iteration at which each vertex last left the selection
    left_at: Vec<Option<usize>>,
    value: f64,
}

impl TabuState {
    /// State for `selection` (one vertex per partition), sums computed from scratch
    pub fn new(model: &WeightModel, selection: Vec<usize>) -> Self {
        let n = model.n;
        let mut selected = vec![false; n];
        for &v in &selection {
            selected[v] = true;
        }

        let mut sum_in = vec![0.0; n];
        let mut sum_out = vec![0.0; n];
        for (i, (s_in, s_out)) in sum_in.iter_mut().zip(sum_out.iter_mut()).enumerate() {
            for (u, &w) in model.row(i).iter().enumerate() {
                if selected[u] {
                    *s_in += w;
                } else {
                    *s_out += w;
                }
            }
        }

        let value = model.evaluate(&selection);
        TabuState {
            selection,
            selected,
            sum_in,
            sum_out,
            entered_at: vec![None; n],
            left_at: vec![None; n],
            value,
        }
    }

    /// First vertex of every partition
    pub fn first_vertices(model: &WeightModel) -> Self {
        let selection = (0..model.m).map(|k| model.partition_range(k).start).collect();
        Self::new(model, selection)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    pub fn sum_in(&self, v: usize) -> f64 {
        self.sum_in[v]
    }

    pub fn sum_out(&self, v: usize) -> f64 {
        self.sum_out[v]
    }

    /// Objective after replacing selected `n1` by `n2`
    #[inline]
    pub fn swap_value(&self, model: &WeightModel, n1: usize, n2: usize) -> f64 {
        self.value - self.sum_in[n1] + model.weight(n2, n2) + self.sum_in[n2] - model.weight(n1, n2)
    }

    /// `n2` left within the last `tenure` iterations
    pub fn is_tabu_in(&self, n2: usize, iteration: usize, tenure: usize) -> bool {
        self.left_at[n2].map_or(false, |left| iteration.saturating_sub(left) <= tenure)
    }

    /// `n1` entered within the last `tenure` iterations
    pub fn is_tabu_out(&self, n1: usize, iteration: usize, tenure: usize) -> bool {
        self.entered_at[n1].map_or(false, |entered| iteration.saturating_sub(entered) <= tenure)
    }

    /// Replace selected `n1` by `n2` (same partition) at `iteration`
    pub fn apply_swap(&mut self, model: &WeightModel, n1: usize, n2: usize, iteration: usize) {
        self.value = self.swap_value(model, n1, n2);
        self.remove(model, n1);
        self.add(model, n2);
        let k = model.partition_of(n1);
        self.selection[k] = n2;
        self.left_at[n1] = Some(iteration);
        self.entered_at[n2] = Some(iteration);
    }

    fn add(&mut self, model: &WeightModel, v: usize) {
        self.selected[v] = true;
        for (i, &w) in model.row(v).iter().enumerate() {
            self.sum_in[i] += w;
            self.sum_out[i] -= w;
        }
    }

    fn remove(&mut self, model: &WeightModel, v: usize) {
        self.selected[v] = false;
        for (i, &w) in model.row(v).iter().enumerate() {
            self.sum_in[i] -= w;
            self.sum_out[i] += w;
        }
    }
}

/// Outcome of a tabu run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabuResult {
    pub best_value: f64,
    pub best_selection: Vec<usize>,
    /// Iteration of the last strict improvement (0 for the start point)
    pub last_improvement_iteration: usize,
    /// Seconds from start to the last strict improvement
    pub last_improvement_time: f64,
    pub iterations: usize,
    /// Iterations without any eligible swap
    pub stand_still_iterations: usize,
    /// Objective after every iteration, when recorded
    pub trajectory: Vec<f64>,
    pub elapsed: f64,
}

impl TabuResult {
    pub fn solution(&self, model: &WeightModel) -> Solution {
        let mut solution = Solution::new();
        solution.vertices = self.best_selection.clone();
        solution.value = model.evaluate(&self.best_selection);
        solution.algorithm = "TabuSearch".to_string();
        solution.computation_time = self.elapsed;
        solution.iterations = Some(self.iterations);
        solution
    }
}

// ==================== Tabu Search ====================

/// Tabu Search
///
/// Starts from the first vertex of every partition and always commits the
/// best eligible swap, even a worsening one. The best selection seen is kept
/// apart from the current one.
pub struct TabuSearch {
    pub config: TabuConfig,
}

impl TabuSearch {
    pub fn new() -> Self {
        TabuSearch {
            config: TabuConfig::default(),
        }
    }

    pub fn with_config(config: TabuConfig) -> Self {
        TabuSearch { config }
    }

    pub fn with_params(max_iterations: usize, tabu_in: usize, tabu_out: usize, max_worsening: usize) -> Self {
        TabuSearch {
            config: TabuConfig {
                max_iterations,
                tabu_in,
                tabu_out,
                max_worsening,
                ..Default::default()
            },
        }
    }

    pub fn run(&self, model: &WeightModel) -> TabuResult {
        self.run_from(model, TabuState::first_vertices(model))
    }

    /// Search starting from an arbitrary state
    pub fn run_from(&self, model: &WeightModel, mut state: TabuState) -> TabuResult {
        let start = Instant::now();
        let eps = self.config.epsilon;

        let mut best_value = state.value();
        let mut best_selection = state.selection().to_vec();
        let mut last_improvement_iteration = 0;
        let mut last_improvement_time = 0.0;
        let mut since_improvement = 0;
        let mut stand_still = 0;
        let mut iterations = 0;
        let mut trajectory = Vec::new();

        for iteration in 1..self.config.max_iterations {
            if since_improvement >= self.config.max_worsening {
                break;
            }
            iterations = iteration;

            let mut best_move: Option<(usize, usize, f64)> = None;
            for k in 0..model.m {
                let n1 = state.selection()[k];
                if state.is_tabu_out(n1, iteration, self.config.tabu_out) {
                    continue;
                }
                for n2 in model.partition_range(k) {
                    if n2 == n1 || state.is_tabu_in(n2, iteration, self.config.tabu_in) {
                        continue;
                    }
                    let value = state.swap_value(model, n1, n2);
                    if best_move.map_or(true, |(_, _, v)| value > v + eps) {
                        best_move = Some((n1, n2, value));
                    }
                }
            }

            match best_move {
                Some((n1, n2, value)) => {
                    state.apply_swap(model, n1, n2, iteration);
                    log::trace!("it {}: swap {} -> {} value {:.4}", iteration, n1, n2, value);
                }
                None => {
                    stand_still += 1;
                    log::warn!("Tabu iteration {} has no eligible swap, standing still", iteration);
                }
            }

            if state.value() > best_value + eps {
                best_value = state.value();
                best_selection.copy_from_slice(state.selection());
                last_improvement_iteration = iteration;
                last_improvement_time = start.elapsed().as_secs_f64();
                since_improvement = 0;
            } else {
                since_improvement += 1;
            }

            if self.config.record_trajectory {
                trajectory.push(state.value());
            }
        }

        log::info!(
            "Tabu search: best {:.4} at iteration {} ({} iterations, {} standing still)",
            best_value,
            last_improvement_iteration,
            iterations,
            stand_still
        );

        TabuResult {
            best_value,
            best_selection,
            last_improvement_iteration,
            last_improvement_time,
            iterations,
            stand_still_iterations: stand_still,
            trajectory,
            elapsed: start.elapsed().as_secs_f64(),
        }
    }
}

impl Default for TabuSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn brute_force(model: &WeightModel) -> f64 {
        let mut best = f64::NEG_INFINITY;
        let total = model.c.pow(model.m as u32);
        for code in 0..total {
            let mut rest = code;
            let selection: Vec<usize> = (0..model.m)
                .map(|k| {
                    let v = k * model.c + rest % model.c;
                    rest /= model.c;
                    v
                })
                .collect();
            best = best.max(model.evaluate(&selection));
        }
        best
    }

    #[test]
    fn test_swap_value_matches_recomputation() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for seed in 0..25 {
            let m = rng.gen_range(1..=5);
            let c = rng.gen_range(2..=4);
            let model = WeightModel::random(m * c, m, 40, seed).unwrap();
            let selection: Vec<usize> = (0..m).map(|k| k * c + rng.gen_range(0..c)).collect();
            let mut state = TabuState::new(&model, selection);

            for iteration in 1..20 {
                let k = rng.gen_range(0..m);
                let n1 = state.selection()[k];
                let n2 = k * c + (n1 - k * c + rng.gen_range(1..c)) % c;

                let predicted = state.swap_value(&model, n1, n2);
                state.apply_swap(&model, n1, n2, iteration);
                let recomputed = model.evaluate(state.selection());
                assert!((predicted - recomputed).abs() < 1e-9);
                assert!((state.value() - recomputed).abs() < 1e-9);

                let fresh = TabuState::new(&model, state.selection().to_vec());
                for v in 0..model.n {
                    assert!((fresh.sum_in(v) - state.sum_in(v)).abs() < 1e-9);
                    assert!((fresh.sum_out(v) - state.sum_out(v)).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_tabu_markers() {
        let model = WeightModel::random(4, 2, 10, 0).unwrap();
        let mut state = TabuState::first_vertices(&model);
        assert!(!state.is_tabu_in(1, 1, 8));
        state.apply_swap(&model, 0, 1, 3);

        assert!(state.is_tabu_in(0, 4, 8));
        assert!(state.is_tabu_in(0, 11, 8));
        assert!(!state.is_tabu_in(0, 12, 8));
        assert!(state.is_tabu_out(1, 4, 1));
        assert!(!state.is_tabu_out(1, 5, 1));
    }

    #[test]
    fn test_two_by_two_converges_quickly() {
        for seed in 0..10 {
            let model = WeightModel::random(4, 2, 100, seed).unwrap();
            let optimum = brute_force(&model);
            let result = TabuSearch::with_params(50, 8, 1, 1000).run(&model);
            assert!((result.best_value - optimum).abs() < 1e-9, "seed {}", seed);
            assert!(result.last_improvement_iteration < 50);
            assert!((model.evaluate(&result.best_selection) - result.best_value).abs() < 1e-9);
        }
    }

    #[test]
    fn test_stands_still_without_eligible_swap() {
        // one partition of two vertices: after the first swap both vertices are tabu
        let weights = vec![vec![1.0, 0.0], vec![0.0, 3.0]];
        let model = WeightModel::from_matrix("pair", 1, weights).unwrap();
        let config = TabuConfig {
            max_iterations: 6,
            record_trajectory: true,
            ..Default::default()
        };
        let result = TabuSearch::with_config(config).run(&model);

        assert_eq!(result.best_value, 3.0);
        assert_eq!(result.best_selection, vec![1]);
        assert_eq!(result.last_improvement_iteration, 1);
        assert_eq!(result.iterations, 5);
        assert_eq!(result.stand_still_iterations, 4);
        assert_eq!(result.trajectory, vec![3.0; 5]);
    }

    #[test]
    fn test_worsening_limit_stops_search() {
        let model = WeightModel::random(20, 4, 50, 6).unwrap();
        let result = TabuSearch::with_params(100_000, 8, 1, 30).run(&model);
        assert!(result.iterations <= result.last_improvement_iteration + 30);
        assert!(result.best_value <= brute_force(&model) + 1e-9);
    }
}
