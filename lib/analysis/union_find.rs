//! Path-compressed disjoint sets over a fixed universe.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// A classic union-by-size, path-compressing disjoint-set structure over
/// the elements `0..universe`.
///
/// `find` compresses paths behind a shared reference, so lookups stay
/// amortized near-constant even on a frozen, immutable instance.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct UnionFind {
    parent: Vec<Cell<usize>>,
    size: Vec<usize>,
    num_sets: usize,
}

impl UnionFind {
    /// Creates `universe` singleton sets.
    pub fn new(universe: usize) -> UnionFind {
        UnionFind {
            parent: (0..universe).map(Cell::new).collect(),
            size: vec![1; universe],
            num_sets: universe,
        }
    }

    /// The number of elements in the universe.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// The number of disjoint sets currently in the universe.
    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    /// The canonical representative of the set containing `a`, compressing
    /// the path walked as a side effect. `find(find(a)) == find(a)`.
    pub fn find(&self, mut a: usize) -> usize {
        let mut root = a;
        while self.parent[root].get() != root {
            root = self.parent[root].get();
        }
        while self.parent[a].get() != root {
            let next = self.parent[a].get();
            self.parent[a].set(root);
            a = next;
        }
        root
    }

    /// Merges the sets containing `a` and `b` and returns the surviving
    /// representative. Merging an already-merged pair is a no-op.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return root_a;
        }

        let (survivor, absorbed) = if self.size[root_a] >= self.size[root_b] {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[absorbed].set(survivor);
        self.size[survivor] += self.size[absorbed];
        self.num_sets -= 1;
        survivor
    }

    /// True if `a` and `b` are in the same set.
    pub fn same_set(&self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}
