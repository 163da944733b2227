//! Exact solve of small residual spaces by explicit enumeration.

use serde::{Deserialize, Serialize};

use super::blocked::BlockedSet;
use crate::instance::WeightModel;

/// Default bound on the number of selections enumerated at a node
pub const DEFAULT_ENUMERATION_LIMIT: u64 = 500_000;

/// Best selection of a fully enumerated subproblem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enumeration {
    /// Optimal value (`-inf` when some partition has no free vertex)
    pub value: f64,
    pub selection: Option<Vec<usize>>,
    /// Number of selections evaluated
    pub evaluated: u64,
}

/// True when the product of free counts over all partitions is at most `limit`.
///
/// The product is built one partition at a time and the check gives up as soon
/// as the running product exceeds the limit.
pub fn residual_space_within(model: &WeightModel, blocked: &BlockedSet, limit: u64) -> bool {
    let counts: Vec<u64> = (0..model.m)
        .map(|k| blocked.free_count(model.partition_range(k)) as u64)
        .collect();
    if counts.contains(&0) {
        return true;
    }

    let mut product: u64 = 1;
    for count in counts {
        product = match product.checked_mul(count) {
            Some(p) if p <= limit => p,
            _ => return false,
        };
    }
    true
}

/// Enumerate every selection of free vertices with a mixed-radix counter and
/// keep the best one (first strictly better wins).
pub fn enumerate(model: &WeightModel, blocked: &BlockedSet) -> Enumeration {
    let lists: Vec<Vec<usize>> = (0..model.m)
        .map(|k| blocked.free_in(model.partition_range(k)).collect())
        .collect();

    if lists.iter().any(|l| l.is_empty()) {
        return Enumeration {
            value: f64::NEG_INFINITY,
            selection: None,
            evaluated: 0,
        };
    }

    let m = lists.len();
    let mut digits = vec![0usize; m];
    let mut current: Vec<usize> = lists.iter().map(|l| l[0]).collect();
    let mut best_value = f64::NEG_INFINITY;
    let mut best_selection = current.clone();
    let mut evaluated = 0u64;

    loop {
        let value = model.evaluate(&current);
        evaluated += 1;
        if value > best_value {
            best_value = value;
            best_selection.copy_from_slice(&current);
        }

        // advance the odometer, last partition fastest
        let mut k = m;
        loop {
            if k == 0 {
                return Enumeration {
                    value: best_value,
                    selection: Some(best_selection),
                    evaluated,
                };
            }
            k -= 1;
            digits[k] += 1;
            if digits[k] < lists[k].len() {
                current[k] = lists[k][digits[k]];
                break;
            }
            digits[k] = 0;
            current[k] = lists[k][0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hand_checked_six_vertices() {
        // partitions {0,1,2} and {3,4,5}
        let mut weights = vec![vec![0.0; 6]; 6];
        let diagonal = [1.0, 2.0, 0.0, 3.0, 0.0, 1.0];
        for (i, w) in diagonal.iter().enumerate() {
            weights[i][i] = *w;
        }
        let edges = [(0, 3, 1.0), (0, 4, 6.0), (1, 3, 2.0), (1, 5, 4.0), (2, 4, 9.0), (2, 5, 0.0)];
        for &(i, j, w) in &edges {
            weights[i][j] = w;
            weights[j][i] = w;
        }
        let model = WeightModel::from_matrix("six", 2, weights).unwrap();

        // the nine selections, by hand:
        // (0,3)=5 (0,4)=7 (0,5)=2 (1,3)=7 (1,4)=2 (1,5)=7 (2,3)=3 (2,4)=9 (2,5)=1
        let result = enumerate(&model, &BlockedSet::new(6));
        assert_eq!(result.value, 9.0);
        assert_eq!(result.selection, Some(vec![2, 4]));
        assert_eq!(result.evaluated, 9);
    }

    #[test]
    fn test_first_of_equal_values_wins() {
        let weights = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let model = WeightModel::from_matrix("tie", 1, weights).unwrap();
        let result = enumerate(&model, &BlockedSet::new(2));
        assert_eq!(result.selection, Some(vec![0]));
    }

    #[test]
    fn test_keeps_gains_below_tolerance() {
        let weights = vec![vec![1.0, 0.0], vec![0.0, 1.00009]];
        let model = WeightModel::from_matrix("close", 1, weights).unwrap();
        let result = enumerate(&model, &BlockedSet::new(2));
        assert_eq!(result.value, 1.00009);
        assert_eq!(result.selection, Some(vec![1]));
    }

    #[test]
    fn test_respects_blocked_vertices() {
        let model = WeightModel::random(9, 3, 40, 5).unwrap();
        let mut blocked = BlockedSet::new(9);
        blocked.insert(0);
        blocked.insert(4);
        blocked.insert(5);
        let result = enumerate(&model, &blocked);
        assert_eq!(result.evaluated, 2 * 1 * 3);
        let selection = result.selection.unwrap();
        assert_eq!(selection[1], 3);
        assert!(selection.iter().all(|&v| !blocked.contains(v)));
    }

    #[test]
    fn test_residual_space_limit() {
        let model = WeightModel::random(20, 4, 10, 1).unwrap();
        let mut blocked = BlockedSet::new(20);
        // 5^4 = 625
        assert!(residual_space_within(&model, &blocked, 625));
        assert!(!residual_space_within(&model, &blocked, 624));

        for v in 0..5 {
            blocked.insert(v);
        }
        // an empty partition is trivially enumerable
        assert!(residual_space_within(&model, &blocked, 1));
    }

    #[test]
    fn test_residual_space_does_not_overflow() {
        let model = WeightModel::random(128, 64, 1, 2).unwrap();
        assert!(!residual_space_within(&model, &BlockedSet::new(128), u64::MAX - 1));
    }
}
