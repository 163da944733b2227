//! MEWCP Solver Library
//!
//! An exact solver for the Maximum Edge-Weighted Clique Problem with partition
//! constraints: pick one vertex in each of `m` equal-size partitions so that
//! the selected vertex weights plus the weights of the edges among them are
//! as large as possible.
//!
//! # Features
//!
//! - Tabu search with O(1) swap evaluation for the initial incumbent
//! - Best-bound branch-and-bound with partition splits
//! - Combinatorial bound, explicit enumeration and a pluggable relaxation oracle
//! - AMPL `.dat` instance reader/writer and random instance generator
//! - Benchmarking over instance directories
//!
//! # Example
//!
//! ```no_run
//! use mewcp_solver::exact::{solve_with_tabu, SearchConfig};
//! use mewcp_solver::heuristics::TabuConfig;
//! use mewcp_solver::instance::WeightModel;
//!
//! let model = WeightModel::from_file("instance.dat").unwrap();
//! let tabu_config = TabuConfig { max_iterations: 1000, ..Default::default() };
//! let (tabu, result) = solve_with_tabu(&model, tabu_config, SearchConfig::default()).unwrap();
//!
//! println!("tabu: {:.2}, optimum: {:.2}", tabu.best_value, result.optimal_value);
//! ```

pub mod benchmark;
pub mod error;
pub mod exact;
pub mod heuristics;
pub mod instance;
pub mod solution;

pub use error::{MewcpError, Result};
pub use instance::WeightModel;
pub use solution::Solution;

/// Tolerance used by every bound and objective comparison
pub const EPSILON: f64 = 1e-4;
