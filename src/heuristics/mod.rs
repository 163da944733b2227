//! Heuristics module for MEWCP.
//!
//! This module exports the tabu search that seeds the exact search.

pub mod tabu;

pub use tabu::*;
