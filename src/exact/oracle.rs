//! Continuous relaxation oracle.
//!
//! The search tree only depends on the [`RelaxationOracle`] contract: given the
//! blocked vertices of a node, its branching-constraint vector and an optional
//! warm start, return an upper bound, one intensity per vertex and a dual vector
//! that descendants reuse as their warm start. Constraint matrices shared by all
//! nodes belong to the implementation.
//!
//! [`CombinatorialRelaxation`] is the built-in implementation. It needs no
//! external solver: the dual bound is the combinatorial bound and intensities
//! come from normalized local values.

use serde::{Deserialize, Serialize};

use super::blocked::BlockedSet;
use super::combinatorial::combinatorial_bound;
use crate::error::Result;
use crate::instance::WeightModel;

/// Outcome status of an oracle call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleStatus {
    Converged,
    /// Iteration limit reached; the bound is valid but may be loose
    NotConverged,
    /// Numerical trouble; the bound is valid but may be loose
    Degenerate,
}

/// Everything an oracle sees of a node
#[derive(Debug, Clone, Copy)]
pub struct OracleInput<'a> {
    pub n: usize,
    pub blocked: &'a BlockedSet,
    /// Packed lower-triangle branching constraints, see [`BlockedSet::constraint_vector`]
    pub constraints: &'a [f64],
    pub warm_start: Option<&'a [f64]>,
}

/// Result of a relaxation solve
#[derive(Debug, Clone)]
pub struct OracleResult {
    pub dual_bound: f64,
    /// Fractional value of every vertex
    pub intensities: Vec<f64>,
    /// Dual vector handed to descendants as warm start
    pub dual_vector: Vec<f64>,
    pub status: OracleStatus,
}

impl OracleResult {
    pub fn converged(dual_bound: f64, intensities: Vec<f64>, dual_vector: Vec<f64>) -> Self {
        OracleResult {
            dual_bound,
            intensities,
            dual_vector,
            status: OracleStatus::Converged,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.status == OracleStatus::Converged
    }
}

/// Relaxation solved at open nodes of the search tree.
///
/// An `Err` means the oracle could not produce any bound and aborts the search.
/// Loose bounds are reported through [`OracleStatus`] instead.
pub trait RelaxationOracle {
    fn solve(&mut self, input: &OracleInput<'_>) -> Result<OracleResult>;
    fn name(&self) -> &str;
}

/// Relaxation built on the combinatorial bound.
///
/// Intensities inside a partition mix the normalized local values
/// `(v - min + 1) / sum` with the uniform distribution over free vertices, so a
/// vertex reaches intensity 1 only when it is the last free vertex of its
/// partition. Blocked vertices get 0.
pub struct CombinatorialRelaxation<'a> {
    model: &'a WeightModel,
    epsilon: f64,
}

impl<'a> CombinatorialRelaxation<'a> {
    pub fn new(model: &'a WeightModel, epsilon: f64) -> Self {
        CombinatorialRelaxation { model, epsilon }
    }
}

impl RelaxationOracle for CombinatorialRelaxation<'_> {
    fn solve(&mut self, input: &OracleInput<'_>) -> Result<OracleResult> {
        let model = self.model;
        let bound = combinatorial_bound(model, input.blocked, self.epsilon);

        let mut intensities = vec![0.0; input.n];
        if bound.is_feasible() {
            for k in 0..model.m {
                let free: Vec<usize> = input.blocked.free_in(model.partition_range(k)).collect();
                let min = free
                    .iter()
                    .map(|&v| bound.local_values[v])
                    .fold(f64::INFINITY, f64::min);
                let shifted: Vec<f64> = free.iter().map(|&v| bound.local_values[v] - min + 1.0).collect();
                let sum: f64 = shifted.iter().sum();
                let uniform = 1.0 / free.len() as f64;
                for (&v, s) in free.iter().zip(shifted) {
                    intensities[v] = 0.5 * (s / sum) + 0.5 * uniform;
                }
            }
        }

        let dual_vector = input
            .warm_start
            .map(|w| w.to_vec())
            .unwrap_or_else(|| vec![0.0; input.n]);

        Ok(OracleResult::converged(bound.dual_bound, intensities, dual_vector))
    }

    fn name(&self) -> &str {
        "combinatorial"
    }
}

/// Round intensities to a selection: in every partition take the free vertex of
/// largest intensity (first strictly larger wins, the first free vertex by
/// default). `None` when some partition has no free vertex.
pub fn round_intensities(
    model: &WeightModel,
    blocked: &BlockedSet,
    intensities: &[f64],
    epsilon: f64,
) -> Option<Vec<usize>> {
    let mut selection = Vec::with_capacity(model.m);
    for k in 0..model.m {
        let mut free = blocked.free_in(model.partition_range(k));
        let mut best = free.next()?;
        for v in free {
            if intensities[v] > intensities[best] + epsilon {
                best = v;
            }
        }
        selection.push(best);
    }
    Some(selection)
}
