//! Branch-and-bound tree controller.
//!
//! Best-bound search: the open node with the largest dual bound is expanded
//! first. Each child is bounded right after the split by one of three
//! procedures:
//! - explicit enumeration when its residual space is small enough,
//! - the combinatorial bound followed by the relaxation oracle when the
//!   combinatorial bound was tighter on the parent,
//! - the relaxation oracle alone otherwise.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::branching::{mask_blocked, BranchingStrategy};
use super::combinatorial::combinatorial_bound;
use super::enumeration::{enumerate, residual_space_within, DEFAULT_ENUMERATION_LIMIT};
use super::oracle::{round_intensities, OracleInput, RelaxationOracle};
use super::pool::NodePool;
use super::subproblem::Subproblem;
use crate::error::{MewcpError, Result};
use crate::instance::WeightModel;
use crate::solution::Solution;
use crate::EPSILON;

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Tolerance of every bound comparison
    pub epsilon: f64,
    /// Time limit in seconds, checked once per dequeued node
    pub time_limit: f64,
    /// Largest residual space solved by enumeration
    pub enumeration_limit: u64,
    pub use_combinatorial: bool,
    /// Fix every vertex at the root and drop the ones that cannot beat the incumbent
    pub use_preprocessing: bool,
    pub use_enumeration: bool,
    /// Periodic progress lines
    pub verbose: bool,
    /// Explored nodes between progress lines
    pub log_freq: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            epsilon: EPSILON,
            time_limit: 3600.0,
            enumeration_limit: DEFAULT_ENUMERATION_LIMIT,
            use_combinatorial: true,
            use_preprocessing: true,
            use_enumeration: true,
            verbose: false,
            log_freq: 1000,
        }
    }
}

impl SearchConfig {
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = seconds;
        self
    }

    pub fn time_limit_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// How a freshly created node gets its bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundingProcedure {
    /// Solve the node exactly and fathom it
    Enumeration,
    /// Combinatorial bound, then the oracle if the node survives
    CombinatorialFirst,
    Relaxation,
}

impl BoundingProcedure {
    pub fn select(config: &SearchConfig, residual_within_limit: bool, parent_combinatorial_profitable: bool) -> Self {
        if config.use_enumeration && residual_within_limit {
            BoundingProcedure::Enumeration
        } else if config.use_combinatorial && parent_combinatorial_profitable {
            BoundingProcedure::CombinatorialFirst
        } else {
            BoundingProcedure::Relaxation
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStatus {
    /// Pool exhausted: the incumbent is optimal
    Optimal,
    /// Stopped by the time limit with open nodes left
    TimeLimit,
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchStatus::Optimal => write!(f, "optimal"),
            SearchStatus::TimeLimit => write!(f, "time-limit"),
        }
    }
}

/// One strict improvement of the incumbent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncumbentUpdate {
    pub value: f64,
    pub node_id: u64,
    pub depth: usize,
    /// Seconds since the start of the run
    pub elapsed: f64,
}

/// Outcome and statistics of a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub status: SearchStatus,
    pub optimal_value: f64,
    pub optimal_selection: Vec<usize>,
    /// Largest bound among the nodes left open (time limit only)
    pub best_bound_left: Option<f64>,
    pub root_bound: f64,
    pub root_combinatorial_bound: Option<f64>,
    pub root_relaxation_bound: Option<f64>,
    /// Incumbent right after the root was bounded
    pub root_primal: f64,
    /// `100 * (root_bound - root_primal) / |root_primal|`
    pub root_gap: f64,
    pub root_time: f64,
    /// Vertices blocked at the root by preprocessing
    pub preprocessing_blocked: usize,
    pub nodes_explored: u64,
    pub nodes_pruned: u64,
    pub nodes_enumerated: u64,
    pub oracle_calls: u64,
    pub open_nodes_left: usize,
    pub max_depth: usize,
    /// Node whose bounding produced the final incumbent
    pub best_node_id: Option<u64>,
    pub best_node_depth: Option<usize>,
    pub incumbent_updates: usize,
    pub incumbent_trace: Vec<IncumbentUpdate>,
    /// Seconds
    pub elapsed: f64,
}

impl SearchResult {
    /// One-line report, tab separated
    pub fn summary_line(&self, name: &str) -> String {
        let left = self
            .best_bound_left
            .map(|b| format!("{:.2}", b))
            .unwrap_or_else(|| "-".to_string());
        let best_node = self
            .best_node_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let best_depth = self
            .best_node_depth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{}\tZ_opt: {:.2}\tDB_left: {}\troot_PB: {:.2}\troot_DB: {:.2}\troot_gap: {:.2}%\troot_time: {:.2}\tbest_node: {}\tbest_depth: {}\texplored: {}\tmax_depth: {}\ttime: {:.2}\tstatus: {}",
            name,
            self.optimal_value,
            left,
            self.root_primal,
            self.root_bound,
            self.root_gap,
            self.root_time,
            best_node,
            best_depth,
            self.nodes_explored,
            self.max_depth,
            self.elapsed,
            self.status,
        )
    }

    /// The final incumbent as a [`Solution`]
    pub fn solution(&self, model: &WeightModel) -> Result<Solution> {
        let mut solution = Solution::from_selection(model, self.optimal_selection.clone(), "branch-and-bound")?;
        solution.computation_time = self.elapsed;
        solution.iterations = Some(self.nodes_explored as usize);
        Ok(solution)
    }
}

#[derive(Debug, Clone)]
struct Incumbent {
    value: f64,
    selection: Vec<usize>,
    node_id: Option<u64>,
    depth: Option<usize>,
    updates: usize,
    trace: Vec<IncumbentUpdate>,
}

impl Incumbent {
    fn new(value: f64, selection: Vec<usize>) -> Self {
        Incumbent {
            value,
            selection,
            node_id: None,
            depth: None,
            updates: 0,
            trace: Vec::new(),
        }
    }
}

struct RootInfo {
    bound: f64,
    combinatorial: Option<f64>,
    relaxation: Option<f64>,
    primal: f64,
    time: f64,
    blocked: usize,
}

fn gap_percent(bound: f64, primal: f64) -> f64 {
    if !bound.is_finite() || !primal.is_finite() {
        return 0.0;
    }
    100.0 * (bound - primal) / primal.abs().max(1.0)
}

/// Branch-and-bound search over one instance.
///
/// Owns the open nodes, the incumbent and the oracle. Single threaded.
pub struct SearchTree<'a, O: RelaxationOracle> {
    model: &'a WeightModel,
    oracle: O,
    config: SearchConfig,
    branching: BranchingStrategy,
    pool: NodePool,
    incumbent: Incumbent,
    next_node_id: u64,
    nodes_explored: u64,
    nodes_pruned: u64,
    nodes_enumerated: u64,
    oracle_calls: u64,
    max_depth: usize,
    start_time: Option<Instant>,
}

impl<'a, O: RelaxationOracle> SearchTree<'a, O> {
    pub fn new(model: &'a WeightModel, oracle: O, config: SearchConfig) -> Self {
        SearchTree {
            model,
            oracle,
            branching: BranchingStrategy::new(config.epsilon),
            config,
            pool: NodePool::new(),
            incumbent: Incumbent::new(f64::NEG_INFINITY, Vec::new()),
            next_node_id: 1,
            nodes_explored: 0,
            nodes_pruned: 0,
            nodes_enumerated: 0,
            oracle_calls: 0,
            max_depth: 0,
            start_time: None,
        }
    }

    /// Solve the subproblem `root` to optimality or until `time_limit` expires.
    ///
    /// `incumbent_value`/`incumbent_selection` seed the pruning threshold; pass
    /// `f64::NEG_INFINITY` and an empty selection to start without one.
    pub fn run(
        &mut self,
        mut root: Subproblem,
        incumbent_value: f64,
        incumbent_selection: Vec<usize>,
        time_limit: Duration,
    ) -> Result<SearchResult> {
        if root.blocked.universe() != self.model.n {
            return Err(MewcpError::InvalidInstance(format!(
                "root covers {} vertices, instance has {}",
                root.blocked.universe(),
                self.model.n
            )));
        }
        if !incumbent_selection.is_empty() {
            self.model.check_selection(&incumbent_selection)?;
        }

        self.start_time = Some(Instant::now());
        self.pool = NodePool::new();
        self.incumbent = Incumbent::new(incumbent_value, incumbent_selection);
        self.next_node_id = root.id + 1;
        self.nodes_explored = 0;
        self.nodes_pruned = 0;
        self.nodes_enumerated = 0;
        self.oracle_calls = 0;
        self.max_depth = root.depth;

        log::info!(
            "Search on {} (n={}, m={}) with oracle '{}', incumbent {:.4}",
            self.model.name,
            self.model.n,
            self.model.m,
            self.oracle.name(),
            incumbent_value
        );

        let blocked_before = root.blocked.len();
        if self.config.use_preprocessing {
            self.preprocess(&mut root);
        }
        let preprocessing_blocked = root.blocked.len() - blocked_before;

        self.bound(&mut root, true)?;
        let root_info = RootInfo {
            bound: root.dual_bound,
            combinatorial: root.combinatorial_bound,
            relaxation: root.relaxation_bound,
            primal: self.incumbent.value,
            time: self.elapsed().as_secs_f64(),
            blocked: preprocessing_blocked,
        };
        log::info!(
            "Root: DB {:.4} (comb {:?}, relax {:?}) PB {:.4} gap {:.2}% in {:.3}s",
            root_info.bound,
            root_info.combinatorial,
            root_info.relaxation,
            root_info.primal,
            gap_percent(root_info.bound, root_info.primal),
            root_info.time
        );
        self.close_or_keep(root);

        let mut status = SearchStatus::Optimal;
        while !self.pool.is_empty() {
            if self.elapsed() >= time_limit {
                log::info!(
                    "Time limit reached with {} open nodes, best bound {:.4}",
                    self.pool.len(),
                    self.pool.best_bound()
                );
                status = SearchStatus::TimeLimit;
                break;
            }

            let Some(node) = self.pool.pop_max_bound() else {
                break;
            };
            self.nodes_explored += 1;
            self.log_progress();
            self.expand(node)?;
        }

        Ok(self.finalize(status, root_info))
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn is_dominated(&self, bound: f64) -> bool {
        bound <= self.incumbent.value + self.config.epsilon
    }

    /// Branch `node` and bound both children
    fn expand(&mut self, mut node: Subproblem) -> Result<()> {
        let threshold = self.incumbent.value;
        if node.dual_bound <= threshold + self.config.epsilon {
            log::debug!("Node {} pruned at dequeue (DB {:.4})", node.id, node.dual_bound);
            self.nodes_pruned += 1;
            return Ok(());
        }

        if node.intensities.is_none() {
            self.apply_relaxation(&mut node)?;
            if self.is_dominated(node.dual_bound) {
                self.nodes_pruned += 1;
                return Ok(());
            }
        }

        let decision = match node.intensities.as_deref() {
            Some(x) => self.branching.select(x, self.model.n, self.model.m),
            None => None,
        };
        let Some(decision) = decision else {
            log::debug!(
                "Node {} has no fractional split, fathomed with PB {:.4}",
                node.id,
                node.primal_value
            );
            self.nodes_pruned += 1;
            return Ok(());
        };

        let split = self.branching.split(decision, &node.blocked, self.model.c);
        let profitable = node.combinatorial_profitable();
        let left_id = self.next_id();
        let right_id = self.next_id();
        let children = [node.child(left_id, &split.left), node.child(right_id, &split.right)];
        log::debug!(
            "Node {} (depth {}, DB {:.4}) split on partition {} at vertex {}",
            node.id,
            node.depth,
            node.dual_bound,
            decision.partition,
            decision.pivot
        );

        for mut child in children {
            self.max_depth = self.max_depth.max(child.depth);
            self.bound(&mut child, profitable)?;
            self.close_or_keep(child);
        }
        Ok(())
    }

    fn close_or_keep(&mut self, node: Subproblem) {
        if node.solved || self.is_dominated(node.dual_bound) {
            self.nodes_pruned += 1;
        } else {
            self.pool.insert(node);
        }
    }

    fn bound(&mut self, node: &mut Subproblem, parent_profitable: bool) -> Result<()> {
        if node.is_infeasible(self.model) {
            log::debug!("Node {} has an empty partition", node.id);
            node.dual_bound = f64::NEG_INFINITY;
            node.solved = true;
            return Ok(());
        }

        let within = self.config.use_enumeration
            && residual_space_within(self.model, &node.blocked, self.config.enumeration_limit);

        match BoundingProcedure::select(&self.config, within, parent_profitable) {
            BoundingProcedure::Enumeration => self.apply_enumeration(node),
            BoundingProcedure::CombinatorialFirst => {
                self.apply_combinatorial(node);
                if !self.is_dominated(node.dual_bound) {
                    self.apply_relaxation(node)?;
                }
            }
            BoundingProcedure::Relaxation => {
                self.apply_relaxation(node)?;
                // keeps the profitability test meaningful for the children
                if self.config.use_combinatorial && !self.is_dominated(node.dual_bound) {
                    self.apply_combinatorial(node);
                }
            }
        }
        Ok(())
    }

    fn apply_enumeration(&mut self, node: &mut Subproblem) {
        let result = enumerate(self.model, &node.blocked);
        self.nodes_enumerated += 1;
        node.dual_bound = result.value;
        node.solved = true;
        if let Some(selection) = &result.selection {
            node.offer_primal(result.value, selection, self.config.epsilon);
            self.offer_incumbent(result.value, selection, node.id, node.depth);
        }
    }

    fn apply_combinatorial(&mut self, node: &mut Subproblem) {
        let bound = combinatorial_bound(self.model, &node.blocked, self.config.epsilon);
        node.combinatorial_bound = Some(bound.dual_bound);
        node.tighten(bound.dual_bound);
        if let Some(selection) = &bound.selection {
            node.offer_primal(bound.primal_value, selection, self.config.epsilon);
            self.offer_incumbent(bound.primal_value, selection, node.id, node.depth);
        }
    }

    fn apply_relaxation(&mut self, node: &mut Subproblem) -> Result<()> {
        let model = self.model;
        let result = {
            let input = OracleInput {
                n: model.n,
                blocked: &node.blocked,
                constraints: &node.constraints,
                warm_start: node.warm_start.as_deref(),
            };
            self.oracle.solve(&input)?
        };
        self.oracle_calls += 1;

        if result.intensities.len() != model.n {
            return Err(MewcpError::Oracle(format!(
                "expected {} intensities, got {}",
                model.n,
                result.intensities.len()
            )));
        }
        if !result.is_converged() {
            log::warn!(
                "Oracle '{}' returned {:?} at node {}, using bound {:.4}",
                self.oracle.name(),
                result.status,
                node.id,
                result.dual_bound
            );
        }

        node.relaxation_bound = Some(result.dual_bound);
        node.tighten(result.dual_bound);

        let x = mask_blocked(&result.intensities, &node.blocked);
        if let Some(selection) = round_intensities(model, &node.blocked, &x, self.config.epsilon) {
            let value = model.evaluate(&selection);
            node.offer_primal(value, &selection, self.config.epsilon);
            self.offer_incumbent(value, &selection, node.id, node.depth);
        }
        node.intensities = Some(x);
        node.warm_start = Some(result.dual_vector);
        Ok(())
    }

    /// Bound the root once per vertex with the vertex fixed in its partition,
    /// then block every vertex whose fixed bound cannot beat the incumbent.
    fn preprocess(&mut self, root: &mut Subproblem) {
        let model = self.model;
        let eps = self.config.epsilon;
        let mut fixed_bounds = vec![f64::INFINITY; model.n];

        for k in 0..model.m {
            let free: Vec<usize> = root.blocked.free_in(model.partition_range(k)).collect();
            for &i in &free {
                let mut blocked = root.blocked.clone();
                for j in model.partition_range(k) {
                    if j != i {
                        blocked.insert(j);
                    }
                }
                let bound = combinatorial_bound(model, &blocked, eps);
                fixed_bounds[i] = bound.dual_bound;
                if let Some(selection) = &bound.selection {
                    root.offer_primal(bound.primal_value, selection, eps);
                    self.offer_incumbent(bound.primal_value, selection, root.id, root.depth);
                }
            }
        }

        let mut removed = 0;
        for (v, &bound) in fixed_bounds.iter().enumerate() {
            if !root.blocked.contains(v) && self.incumbent.value - bound > eps {
                root.blocked.insert(v);
                removed += 1;
            }
        }
        root.refresh_constraints();
        log::info!(
            "Preprocessing blocked {} of {} vertices (incumbent {:.4})",
            removed,
            model.n,
            self.incumbent.value
        );
    }

    fn offer_incumbent(&mut self, value: f64, selection: &[usize], node_id: u64, depth: usize) -> bool {
        if value <= self.incumbent.value + self.config.epsilon {
            return false;
        }
        let elapsed = self.elapsed().as_secs_f64();
        self.incumbent.value = value;
        self.incumbent.selection = selection.to_vec();
        self.incumbent.node_id = Some(node_id);
        self.incumbent.depth = Some(depth);
        self.incumbent.updates += 1;
        self.incumbent.trace.push(IncumbentUpdate {
            value,
            node_id,
            depth,
            elapsed,
        });
        log::info!("New incumbent {:.4} at node {} (depth {})", value, node_id, depth);
        true
    }

    fn log_progress(&self) {
        if !self.config.verbose || self.config.log_freq == 0 {
            return;
        }
        if self.nodes_explored % self.config.log_freq != 0 {
            return;
        }
        let bound = self.pool.best_bound().max(self.incumbent.value);
        log::info!(
            "Nodes: {} ({} open) | Bound: {:.4} | Incumbent: {:.4} | Gap: {:.2}% | Time: {:.1}s",
            self.nodes_explored,
            self.pool.len(),
            bound,
            self.incumbent.value,
            gap_percent(bound, self.incumbent.value),
            self.elapsed().as_secs_f64(),
        );
    }

    fn finalize(&self, status: SearchStatus, root: RootInfo) -> SearchResult {
        let elapsed = self.elapsed().as_secs_f64();
        let best_bound_left = match status {
            // nodes overtaken by the incumbent may still sit in the pool
            SearchStatus::TimeLimit => Some(self.pool.best_bound().max(self.incumbent.value)),
            SearchStatus::Optimal => None,
        };
        log::info!(
            "Search finished ({}): value {:.4}, {} nodes explored, {:.2}s",
            status,
            self.incumbent.value,
            self.nodes_explored,
            elapsed
        );

        SearchResult {
            status,
            optimal_value: self.incumbent.value,
            optimal_selection: self.incumbent.selection.clone(),
            best_bound_left,
            root_bound: root.bound,
            root_combinatorial_bound: root.combinatorial,
            root_relaxation_bound: root.relaxation,
            root_primal: root.primal,
            root_gap: gap_percent(root.bound, root.primal),
            root_time: root.time,
            preprocessing_blocked: root.blocked,
            nodes_explored: self.nodes_explored,
            nodes_pruned: self.nodes_pruned,
            nodes_enumerated: self.nodes_enumerated,
            oracle_calls: self.oracle_calls,
            open_nodes_left: self.pool.len(),
            max_depth: self.max_depth,
            best_node_id: self.incumbent.node_id,
            best_node_depth: self.incumbent.depth,
            incumbent_updates: self.incumbent.updates,
            incumbent_trace: self.incumbent.trace.clone(),
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::blocked::BlockedSet;
    use crate::exact::oracle::{CombinatorialRelaxation, OracleResult, OracleStatus};

    fn optimum(model: &WeightModel) -> f64 {
        enumerate(model, &BlockedSet::new(model.n)).value
    }

    fn branching_only() -> SearchConfig {
        SearchConfig {
            use_enumeration: false,
            use_preprocessing: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_bounding_procedure_selection() {
        let config = SearchConfig::default();
        assert_eq!(BoundingProcedure::select(&config, true, false), BoundingProcedure::Enumeration);
        assert_eq!(BoundingProcedure::select(&config, false, true), BoundingProcedure::CombinatorialFirst);
        assert_eq!(BoundingProcedure::select(&config, false, false), BoundingProcedure::Relaxation);

        let config = SearchConfig {
            use_enumeration: false,
            use_combinatorial: false,
            ..Default::default()
        };
        assert_eq!(BoundingProcedure::select(&config, true, true), BoundingProcedure::Relaxation);
    }

    #[test]
    fn test_branching_reaches_optimum() {
        for seed in 0..12 {
            let m = 2 + (seed as usize % 3);
            let model = WeightModel::random(m * 4, m, 50, seed).unwrap();
            let oracle = CombinatorialRelaxation::new(&model, EPSILON);
            let mut tree = SearchTree::new(&model, oracle, branching_only());

            let result = tree
                .run(Subproblem::root(model.n), f64::NEG_INFINITY, Vec::new(), Duration::from_secs(60))
                .unwrap();

            assert_eq!(result.status, SearchStatus::Optimal);
            assert!((result.optimal_value - optimum(&model)).abs() < 1e-6, "seed {}", seed);
            assert!((model.evaluate(&result.optimal_selection) - result.optimal_value).abs() < 1e-9);
            assert!(result.root_bound + 1e-9 >= result.optimal_value);
            assert_eq!(result.open_nodes_left, 0);
        }
    }

    #[test]
    fn test_every_toggle_combination_agrees() {
        let model = WeightModel::random(15, 3, 40, 77).unwrap();
        let expected = optimum(&model);
        for mask in 0..8u8 {
            let config = SearchConfig {
                use_combinatorial: mask & 1 != 0,
                use_preprocessing: mask & 2 != 0,
                use_enumeration: mask & 4 != 0,
                enumeration_limit: 20,
                ..Default::default()
            };
            let oracle = CombinatorialRelaxation::new(&model, EPSILON);
            let mut tree = SearchTree::new(&model, oracle, config);
            let result = tree
                .run(Subproblem::root(15), f64::NEG_INFINITY, Vec::new(), Duration::from_secs(60))
                .unwrap();
            assert!((result.optimal_value - expected).abs() < 1e-6, "toggles {:03b}", mask);
        }
    }

    #[test]
    fn test_incumbent_trace_is_increasing() {
        let model = WeightModel::random(24, 4, 100, 5).unwrap();
        let oracle = CombinatorialRelaxation::new(&model, EPSILON);
        let mut tree = SearchTree::new(&model, oracle, branching_only());
        let result = tree
            .run(Subproblem::root(24), f64::NEG_INFINITY, Vec::new(), Duration::from_secs(60))
            .unwrap();

        assert!(!result.incumbent_trace.is_empty());
        assert_eq!(result.incumbent_trace.len(), result.incumbent_updates);
        for pair in result.incumbent_trace.windows(2) {
            assert!(pair[1].value > pair[0].value);
        }
        let last = result.incumbent_trace.last().unwrap();
        assert_eq!(last.value, result.optimal_value);
        assert_eq!(Some(last.node_id), result.best_node_id);
    }

    #[test]
    fn test_seeded_incumbent_is_kept_when_optimal() {
        let model = WeightModel::random(12, 3, 30, 8).unwrap();
        let best = enumerate(&model, &BlockedSet::new(12));
        let selection = best.selection.unwrap();

        let oracle = CombinatorialRelaxation::new(&model, EPSILON);
        let mut tree = SearchTree::new(&model, oracle, branching_only());
        let result = tree
            .run(Subproblem::root(12), best.value, selection.clone(), Duration::from_secs(60))
            .unwrap();
        assert_eq!(result.optimal_selection, selection);
        assert_eq!(result.incumbent_updates, 0);
        assert_eq!(result.best_node_id, None);
    }

    #[test]
    fn test_invalid_incumbent_selection() {
        let model = WeightModel::random(6, 2, 10, 1).unwrap();
        let oracle = CombinatorialRelaxation::new(&model, EPSILON);
        let mut tree = SearchTree::new(&model, oracle, SearchConfig::default());
        let err = tree.run(Subproblem::root(6), 1.0, vec![0, 1], Duration::from_secs(1));
        assert!(matches!(err, Err(MewcpError::InvalidSelection(_))));
    }

    #[test]
    fn test_zero_time_limit_reports_open_bound() {
        let model = WeightModel::random(40, 5, 100, 3).unwrap();
        let oracle = CombinatorialRelaxation::new(&model, EPSILON);
        let mut tree = SearchTree::new(&model, oracle, branching_only());
        let result = tree
            .run(Subproblem::root(40), f64::NEG_INFINITY, Vec::new(), Duration::ZERO)
            .unwrap();

        assert_eq!(result.status, SearchStatus::TimeLimit);
        assert_eq!(result.nodes_explored, 0);
        let left = result.best_bound_left.unwrap();
        assert!(left + 1e-9 >= result.optimal_value);
        assert!((left - result.root_bound).abs() < 1e-9);
    }

    #[test]
    fn test_preprocessing_blocks_dominated_vertices() {
        // vertex 0 is worthless next to vertex 1
        let mut weights = vec![vec![0.0; 4]; 4];
        weights[0][0] = 0.0;
        weights[1][1] = 100.0;
        weights[2][2] = 1.0;
        weights[3][3] = 2.0;
        let model = WeightModel::from_matrix("dominated", 2, weights).unwrap();

        let config = SearchConfig {
            use_enumeration: false,
            ..Default::default()
        };
        let oracle = CombinatorialRelaxation::new(&model, EPSILON);
        let mut tree = SearchTree::new(&model, oracle, config);
        let result = tree
            .run(Subproblem::root(4), f64::NEG_INFINITY, Vec::new(), Duration::from_secs(10))
            .unwrap();

        assert_eq!(result.optimal_value, 102.0);
        assert_eq!(result.optimal_selection, vec![1, 3]);
        assert_eq!(result.preprocessing_blocked, 2);
        assert_eq!(result.status, SearchStatus::Optimal);
    }

    #[test]
    fn test_gains_below_tolerance_are_not_lost() {
        // ten partitions of {1.0, 1.00009}, no edges
        let m = 10;
        let mut weights = vec![vec![0.0; 2 * m]; 2 * m];
        for k in 0..m {
            weights[2 * k][2 * k] = 1.0;
            weights[2 * k + 1][2 * k + 1] = 1.00009;
        }
        let model = WeightModel::from_matrix("close", m, weights).unwrap();
        let expected = optimum(&model);
        assert!((expected - 10.0009).abs() < 1e-9);

        let oracle = CombinatorialRelaxation::new(&model, EPSILON);
        let mut tree = SearchTree::new(&model, oracle, branching_only());
        let result = tree
            .run(Subproblem::root(model.n), f64::NEG_INFINITY, Vec::new(), Duration::from_secs(60))
            .unwrap();

        assert_eq!(result.status, SearchStatus::Optimal);
        assert!(result.root_bound + 1e-9 >= expected, "root bound {}", result.root_bound);
        assert!(
            result.optimal_value + EPSILON + 1e-9 >= expected,
            "{} is more than the tolerance below {}",
            result.optimal_value,
            expected
        );
    }

    #[test]
    fn test_root_with_empty_partition_is_closed() {
        let model = WeightModel::random(6, 2, 10, 2).unwrap();
        let mut root = Subproblem::root(6);
        for v in 0..3 {
            root.blocked.insert(v);
        }
        root.refresh_constraints();

        let config = SearchConfig {
            use_enumeration: false,
            ..Default::default()
        };
        let oracle = CombinatorialRelaxation::new(&model, EPSILON);
        let mut tree = SearchTree::new(&model, oracle, config);
        let result = tree
            .run(root, f64::NEG_INFINITY, Vec::new(), Duration::from_secs(10))
            .unwrap();

        assert_eq!(result.status, SearchStatus::Optimal);
        assert_eq!(result.root_bound, f64::NEG_INFINITY);
        assert_eq!(result.oracle_calls, 0);
        assert!(result.optimal_selection.is_empty());
    }

    /// Built-in relaxation that takes a fixed time per call
    struct SlowOracle<'a> {
        inner: CombinatorialRelaxation<'a>,
        delay: Duration,
    }

    impl RelaxationOracle for SlowOracle<'_> {
        fn solve(&mut self, input: &OracleInput<'_>) -> Result<OracleResult> {
            std::thread::sleep(self.delay);
            self.inner.solve(input)
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[test]
    fn test_time_limit_after_expansion() {
        let model = WeightModel::random(60, 6, 100, 21).unwrap();
        let oracle = SlowOracle {
            inner: CombinatorialRelaxation::new(&model, EPSILON),
            delay: Duration::from_millis(20),
        };
        let mut tree = SearchTree::new(&model, oracle, branching_only());
        let result = tree
            .run(Subproblem::root(60), f64::NEG_INFINITY, Vec::new(), Duration::from_millis(200))
            .unwrap();

        assert_eq!(result.status, SearchStatus::TimeLimit);
        assert!(result.nodes_explored >= 1);
        assert!(result.max_depth >= 1);
        assert!(result.open_nodes_left > 0);
        let left = result.best_bound_left.unwrap();
        assert!(left + EPSILON >= result.optimal_value, "{} < {}", left, result.optimal_value);
        assert!(left <= result.root_bound + 1e-9);
        assert!(result.summary_line("slow").contains("status: time-limit"));
    }

    struct LooseOracle {
        bound: f64,
    }

    impl RelaxationOracle for LooseOracle {
        fn solve(&mut self, input: &OracleInput<'_>) -> Result<OracleResult> {
            let mut x = vec![0.0; input.n];
            for (v, xv) in x.iter_mut().enumerate() {
                if !input.blocked.contains(v) {
                    *xv = 0.5;
                }
            }
            Ok(OracleResult {
                dual_bound: self.bound,
                intensities: x,
                dual_vector: Vec::new(),
                status: OracleStatus::NotConverged,
            })
        }

        fn name(&self) -> &str {
            "loose"
        }
    }

    #[test]
    fn test_non_converged_oracle_still_exact() {
        let model = WeightModel::random(8, 2, 20, 4).unwrap();
        let config = SearchConfig {
            use_preprocessing: false,
            use_enumeration: true,
            enumeration_limit: 2,
            ..Default::default()
        };
        let mut tree = SearchTree::new(&model, LooseOracle { bound: 1e6 }, config);
        let result = tree
            .run(Subproblem::root(8), f64::NEG_INFINITY, Vec::new(), Duration::from_secs(10))
            .unwrap();
        assert!((result.optimal_value - optimum(&model)).abs() < 1e-6);
        assert!(result.oracle_calls > 0);
    }

    struct FailingOracle;

    impl RelaxationOracle for FailingOracle {
        fn solve(&mut self, _input: &OracleInput<'_>) -> Result<OracleResult> {
            Err(MewcpError::Oracle("solver unavailable".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_oracle_failure_aborts_search() {
        let model = WeightModel::random(8, 2, 20, 4).unwrap();
        let config = SearchConfig {
            use_combinatorial: false,
            use_preprocessing: false,
            use_enumeration: false,
            ..Default::default()
        };
        let mut tree = SearchTree::new(&model, FailingOracle, config);
        let result = tree.run(Subproblem::root(8), f64::NEG_INFINITY, Vec::new(), Duration::from_secs(10));
        assert!(matches!(result, Err(MewcpError::Oracle(_))));
    }
}
