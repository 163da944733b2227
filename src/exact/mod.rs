//! Exact solver module.
//!
//! Branch-and-bound over partition splits:
//! - `blocked`, `subproblem`: per-node state
//! - `combinatorial`, `enumeration`, `oracle`: the three bounding procedures
//! - `branching`: pivot selection and child construction
//! - `pool`, `tree`: open-node storage and the search loop

pub mod blocked;
pub mod branching;
pub mod combinatorial;
pub mod enumeration;
pub mod oracle;
pub mod pool;
pub mod subproblem;
pub mod tree;

pub use blocked::{packed_index, BlockedSet};
pub use branching::{BranchDecision, BranchingStrategy, Split};
pub use combinatorial::{combinatorial_bound, CombinatorialBound};
pub use enumeration::{enumerate, residual_space_within, Enumeration, DEFAULT_ENUMERATION_LIMIT};
pub use oracle::{
    round_intensities, CombinatorialRelaxation, OracleInput, OracleResult, OracleStatus, RelaxationOracle,
};
pub use pool::{NodeHandle, NodePool};
pub use subproblem::Subproblem;
pub use tree::{
    BoundingProcedure, IncumbentUpdate, SearchConfig, SearchResult, SearchStatus, SearchTree,
};

use crate::error::Result;
use crate::heuristics::{TabuConfig, TabuResult, TabuSearch};
use crate::instance::WeightModel;

/// Seed an incumbent with tabu search, then prove optimality with the
/// built-in combinatorial relaxation.
pub fn solve_with_tabu(
    model: &WeightModel,
    tabu_config: TabuConfig,
    config: SearchConfig,
) -> Result<(TabuResult, SearchResult)> {
    let tabu = TabuSearch::with_config(tabu_config).run(model);
    let time_limit = config.time_limit_duration();
    let oracle = CombinatorialRelaxation::new(model, config.epsilon);
    let mut tree = SearchTree::new(model, oracle, config);
    let result = tree.run(
        Subproblem::root(model.n),
        tabu.best_value,
        tabu.best_selection.clone(),
        time_limit,
    )?;
    Ok((tabu, result))
}
