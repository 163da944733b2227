//! Open node of the search tree.

use super::blocked::BlockedSet;
use crate::instance::WeightModel;

/// A subproblem: the original instance restricted to the non-blocked vertices.
///
/// Created by branching, tightened by bounding, dropped when closed.
#[derive(Debug, Clone)]
pub struct Subproblem {
    /// Serial id (root is 0)
    pub id: u64,
    pub depth: usize,
    pub blocked: BlockedSet,
    /// Packed branching constraints mirroring `blocked`
    pub constraints: Vec<f64>,
    /// Best dual bound over the procedures applied so far
    pub dual_bound: f64,
    pub combinatorial_bound: Option<f64>,
    pub relaxation_bound: Option<f64>,
    /// Best primal value found while bounding this node
    pub primal_value: f64,
    pub primal_selection: Option<Vec<usize>>,
    /// Fractional point of the last relaxation solve, blocked vertices at 0
    pub intensities: Option<Vec<f64>>,
    /// Dual vector passed to descendants
    pub warm_start: Option<Vec<f64>>,
    /// Solved to optimality by enumeration
    pub solved: bool,
}

impl Subproblem {
    /// Root node over `n` vertices with nothing blocked
    pub fn root(n: usize) -> Self {
        Self::with_blocked(0, 0, BlockedSet::new(n), f64::INFINITY, None)
    }

    fn with_blocked(id: u64, depth: usize, blocked: BlockedSet, dual_bound: f64, warm_start: Option<Vec<f64>>) -> Self {
        let constraints = blocked.constraint_vector();
        Subproblem {
            id,
            depth,
            blocked,
            constraints,
            dual_bound,
            combinatorial_bound: None,
            relaxation_bound: None,
            primal_value: f64::NEG_INFINITY,
            primal_selection: None,
            intensities: None,
            warm_start,
            solved: false,
        }
    }

    /// Child that blocks `extra` on top of this node's blocked vertices.
    ///
    /// The child starts from the parent's dual bound and warm start.
    pub fn child(&self, id: u64, extra: &[usize]) -> Self {
        let mut blocked = self.blocked.clone();
        for &v in extra {
            blocked.insert(v);
        }
        Self::with_blocked(id, self.depth + 1, blocked, self.dual_bound, self.warm_start.clone())
    }

    pub fn refresh_constraints(&mut self) {
        self.constraints = self.blocked.constraint_vector();
    }

    /// Lower the dual bound to `bound` if it is tighter
    pub fn tighten(&mut self, bound: f64) {
        if bound < self.dual_bound {
            self.dual_bound = bound;
        }
    }

    /// Record a primal selection on strict improvement beyond `epsilon`
    pub fn offer_primal(&mut self, value: f64, selection: &[usize], epsilon: f64) -> bool {
        if self.primal_selection.is_none() || value > self.primal_value + epsilon {
            self.primal_value = value;
            self.primal_selection = Some(selection.to_vec());
            return true;
        }
        false
    }

    /// The combinatorial bound was strictly tighter than the relaxation here
    pub fn combinatorial_profitable(&self) -> bool {
        match (self.combinatorial_bound, self.relaxation_bound) {
            (Some(comb), Some(relax)) => comb < relax,
            _ => false,
        }
    }

    /// Free vertex count of every partition
    pub fn free_counts(&self, model: &WeightModel) -> Vec<usize> {
        (0..model.m)
            .map(|k| self.blocked.free_count(model.partition_range(k)))
            .collect()
    }

    /// Some partition has no free vertex left
    pub fn is_infeasible(&self, model: &WeightModel) -> bool {
        self.free_counts(model).contains(&0)
    }
}
