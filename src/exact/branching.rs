//! Partition branching on a fractional point.
//!
//! The pivot partition is the one with the most fractional vertices. Inside it
//! the intensities are accumulated in index order and the pivot is the vertex
//! whose running sum lands closest to one half. The LEFT child keeps the
//! vertices up to the pivot, the RIGHT child keeps the ones after it.

use super::blocked::BlockedSet;

/// Partition and pivot vertex chosen for a split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchDecision {
    pub partition: usize,
    pub pivot: usize,
}

/// Vertices each child adds to the parent's blocked set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// `(pivot, upper]`
    pub left: Vec<usize>,
    /// `[lower, pivot]`
    pub right: Vec<usize>,
}

/// Selects pivot vertices from fractional points.
#[derive(Debug, Clone)]
pub struct BranchingStrategy {
    epsilon: f64,
}

struct Candidate {
    fractional: usize,
    distance: f64,
    pivot: usize,
}

impl BranchingStrategy {
    pub fn new(epsilon: f64) -> Self {
        BranchingStrategy { epsilon }
    }

    /// Choose the split of `x` (one intensity per vertex, blocked vertices at 0).
    ///
    /// Returns `None` when no partition has two fractional vertices, or when
    /// every such partition already holds an integral vertex.
    pub fn select(&self, x: &[f64], n: usize, m: usize) -> Option<BranchDecision> {
        let c = n / m;
        let mut chosen: Option<(usize, Candidate)> = None;

        for k in 0..m {
            let Some(candidate) = self.partition_candidate(&x[k * c..(k + 1) * c], k * c) else {
                continue;
            };
            let better = match &chosen {
                None => true,
                Some((_, best)) => {
                    candidate.fractional > best.fractional
                        || (candidate.fractional == best.fractional && candidate.distance < best.distance)
                }
            };
            if better {
                chosen = Some((k, candidate));
            }
        }

        chosen.map(|(partition, candidate)| BranchDecision {
            partition,
            pivot: candidate.pivot,
        })
    }

    fn partition_candidate(&self, values: &[f64], offset: usize) -> Option<Candidate> {
        let eps = self.epsilon;
        if values.iter().any(|&v| v >= 1.0 - eps) {
            return None;
        }
        let fractional = values.iter().filter(|&&v| v > eps && v < 1.0 - eps).count();
        if fractional < 2 {
            return None;
        }

        let positive: Vec<usize> = (0..values.len()).filter(|&i| values[i] > eps).collect();
        let mut running = 0.0;
        let mut best: Option<(usize, f64)> = None;
        // the last positive vertex would leave the RIGHT child empty
        for &i in &positive[..positive.len() - 1] {
            running += values[i];
            let distance = (running - 0.5).abs();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }

        best.map(|(i, distance)| Candidate {
            fractional,
            distance,
            pivot: offset + i,
        })
    }

    /// Vertices added by each child. Vertices the parent already blocks are
    /// left out.
    pub fn split(&self, decision: BranchDecision, blocked: &BlockedSet, c: usize) -> Split {
        let lower = decision.partition * c;
        let upper = lower + c - 1;
        Split {
            left: blocked.free_in(decision.pivot + 1..upper + 1).collect(),
            right: blocked.free_in(lower..decision.pivot + 1).collect(),
        }
    }
}

/// Copy of `intensities` with blocked vertices forced to 0
pub fn mask_blocked(intensities: &[f64], blocked: &BlockedSet) -> Vec<f64> {
    intensities
        .iter()
        .enumerate()
        .map(|(v, &x)| if blocked.contains(v) { 0.0 } else { x })
        .collect()
}
