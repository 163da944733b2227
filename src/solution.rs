//! Solution representation for MEWCP.
//!
//! A solution picks exactly one vertex per partition; `vertices[k]` is the
//! vertex chosen in partition `k`.

use crate::error::Result;
use crate::instance::WeightModel;
use serde::{Deserialize, Serialize};

/// Represents a solution to the MEWCP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Selected vertex of each partition, in partition order
    pub vertices: Vec<usize>,
    /// Objective value (vertex weights + edge weights among selected vertices)
    pub value: f64,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of iterations (if applicable)
    pub iterations: Option<usize>,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            vertices: Vec::new(),
            value: f64::NEG_INFINITY,
            algorithm: String::new(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Create a solution from a selection, checking it and computing its value
    pub fn from_selection(model: &WeightModel, vertices: Vec<usize>, algorithm: &str) -> Result<Self> {
        model.check_selection(&vertices)?;
        let value = model.evaluate(&vertices);
        Ok(Solution {
            vertices,
            value,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
        })
    }

    /// Re-check the selection and recompute its value
    pub fn validate(&mut self, model: &WeightModel) -> Result<()> {
        model.check_selection(&self.vertices)?;
        self.value = model.evaluate(&self.vertices);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// 1-based vertex ids, as they appear in instance files
    pub fn one_based(&self) -> Vec<usize> {
        self.vertices.iter().map(|v| v + 1).collect()
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Value: {:.4}", self.value)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        writeln!(f, "  Vertices: {:?}", self.one_based())
    }
}
