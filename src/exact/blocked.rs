//! Record of the vertices excluded in a subproblem.

use std::ops::Range;

/// Position of entry `(i, j)` in the packed lower triangle of an `n x n`
/// symmetric matrix (row-major, `n(n+1)/2` entries).
#[inline]
pub fn packed_index(i: usize, j: usize) -> usize {
    let (row, col) = if i >= j { (i, j) } else { (j, i) };
    row * (row + 1) / 2 + col
}

/// Blocked vertices of a subproblem.
///
/// Keeps a membership flag per vertex and the blocked ids in insertion order.
/// A vertex is in the list exactly when its flag is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedSet {
    flags: Vec<bool>,
    order: Vec<usize>,
}

impl BlockedSet {
    /// Empty set over `n` vertices
    pub fn new(n: usize) -> Self {
        BlockedSet {
            flags: vec![false; n],
            order: Vec::new(),
        }
    }

    /// Block `vertex`. Returns false if it was already blocked.
    pub fn insert(&mut self, vertex: usize) -> bool {
        if self.flags[vertex] {
            return false;
        }
        self.flags[vertex] = true;
        self.order.push(vertex);
        true
    }

    #[inline]
    pub fn contains(&self, vertex: usize) -> bool {
        self.flags[vertex]
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of vertices the set ranges over
    pub fn universe(&self) -> usize {
        self.flags.len()
    }

    /// Blocked vertices in insertion order
    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// Non-blocked vertices of `range`, ascending
    pub fn free_in(&self, range: Range<usize>) -> impl Iterator<Item = usize> + '_ {
        range.filter(move |&v| !self.flags[v])
    }

    pub fn free_count(&self, range: Range<usize>) -> usize {
        self.free_in(range).count()
    }

    /// Packed lower triangle with 1.0 on the diagonal entry of every blocked
    /// vertex and 0.0 elsewhere.
    pub fn constraint_vector(&self) -> Vec<f64> {
        let n = self.flags.len();
        let mut packed = vec![0.0; n * (n + 1) / 2];
        for &v in &self.order {
            packed[packed_index(v, v)] = 1.0;
        }
        packed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_flags_and_order_in_sync() {
        let mut set = BlockedSet::new(6);
        assert!(set.insert(4));
        assert!(set.insert(1));
        assert!(!set.insert(4));
        assert_eq!(set.as_slice(), &[4, 1]);
        assert!(set.contains(1));
        assert!(!set.contains(0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_free_vertices() {
        let mut set = BlockedSet::new(6);
        set.insert(3);
        set.insert(5);
        let free: Vec<usize> = set.free_in(3..6).collect();
        assert_eq!(free, vec![4]);
        assert_eq!(set.free_count(0..3), 3);
    }

    #[test]
    fn test_constraint_vector() {
        let mut set = BlockedSet::new(4);
        set.insert(0);
        set.insert(2);
        let packed = set.constraint_vector();
        assert_eq!(packed.len(), 10);
        assert_eq!(packed[0], 1.0);
        assert_eq!(packed[packed_index(2, 2)], 1.0);
        assert_eq!(packed[5], 1.0);
        assert_eq!(packed.iter().sum::<f64>(), 2.0);
        assert_eq!(packed_index(1, 3), packed_index(3, 1));
    }
}
