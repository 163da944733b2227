//! Open-node collection.
//!
//! Nodes live in an index-addressed arena. Removed slots go on a free list and
//! are reused by later insertions.

use super::subproblem::Subproblem;

/// Stable address of a node inside a [`NodePool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(usize);

#[derive(Debug, Default)]
pub struct NodePool {
    slots: Vec<Option<Subproblem>>,
    free: Vec<usize>,
    len: usize,
}

impl NodePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Subproblem) -> NodeHandle {
        self.len += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeHandle(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeHandle(self.slots.len() - 1)
            }
        }
    }

    pub fn remove(&mut self, handle: NodeHandle) -> Option<Subproblem> {
        let node = self.slots.get_mut(handle.0)?.take()?;
        self.free.push(handle.0);
        self.len -= 1;
        Some(node)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&Subproblem> {
        self.slots.get(handle.0)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handle of the node with the largest dual bound. Linear scan in slot
    /// order; the first node found wins ties.
    pub fn max_bound(&self) -> Option<NodeHandle> {
        let mut best: Option<(usize, f64)> = None;
        for (slot, node) in self.slots.iter().enumerate() {
            if let Some(node) = node {
                if best.map_or(true, |(_, bound)| node.dual_bound > bound) {
                    best = Some((slot, node.dual_bound));
                }
            }
        }
        best.map(|(slot, _)| NodeHandle(slot))
    }

    /// Remove and return the node with the largest dual bound
    pub fn pop_max_bound(&mut self) -> Option<Subproblem> {
        let handle = self.max_bound()?;
        self.remove(handle)
    }

    /// Largest dual bound among open nodes (`-inf` when empty)
    pub fn best_bound(&self) -> f64 {
        self.iter().map(|n| n.dual_bound).fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subproblem> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, bound: f64) -> Subproblem {
        let mut node = Subproblem::root(2);
        node.id = id;
        node.dual_bound = bound;
        node
    }

    #[test]
    fn test_pop_order_is_max_bound() {
        let mut pool = NodePool::new();
        pool.insert(node(1, 5.0));
        pool.insert(node(2, 9.0));
        pool.insert(node(3, 7.0));

        assert_eq!(pool.best_bound(), 9.0);
        assert_eq!(pool.pop_max_bound().map(|n| n.id), Some(2));
        assert_eq!(pool.pop_max_bound().map(|n| n.id), Some(3));
        assert_eq!(pool.pop_max_bound().map(|n| n.id), Some(1));
        assert!(pool.pop_max_bound().is_none());
        assert_eq!(pool.best_bound(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_ties_go_to_first_slot() {
        let mut pool = NodePool::new();
        pool.insert(node(1, 3.0));
        pool.insert(node(2, 3.0));
        assert_eq!(pool.pop_max_bound().map(|n| n.id), Some(1));
    }

    #[test]
    fn test_slots_are_reused() {
        let mut pool = NodePool::new();
        let a = pool.insert(node(1, 1.0));
        let b = pool.insert(node(2, 2.0));
        assert_eq!(pool.remove(a).map(|n| n.id), Some(1));
        assert!(pool.remove(a).is_none());
        let c = pool.insert(node(3, 3.0));
        assert_eq!(c, a);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(b).map(|n| n.id), Some(2));
        assert_eq!(pool.iter().count(), 2);
    }
}
