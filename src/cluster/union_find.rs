//! Disjoint-set forest for connected-component clustering.
//!
//! Carries one extra bit per component: whether every edge merged into
//! it so far met the duplicate threshold. Folding the flag during
//! unions avoids re-walking edges after the components settle.

/// Union-find with path compression, union by rank, and a
/// per-component all-duplicate flag.
#[derive(Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    /// Valid only at component roots.
    all_duplicate: Vec<bool>,
}

impl UnionFind {
    /// Creates `n` singleton components, each trivially all-duplicate.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            all_duplicate: vec![true; n],
        }
    }

    /// Finds the component root of `x`, compressing the path.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = x;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Records an edge between `a` and `b`.
    ///
    /// `duplicate_edge` marks whether the edge met the duplicate
    /// threshold; a single non-duplicate edge anywhere in a component
    /// permanently clears its flag, including edges inside an already
    /// merged component.
    pub fn union(&mut self, a: usize, b: usize, duplicate_edge: bool) {
        let root_a = self.find(a);
        let root_b = self.find(b);

        if root_a == root_b {
            self.all_duplicate[root_a] &= duplicate_edge;
            return;
        }

        let merged_flag =
            self.all_duplicate[root_a] && self.all_duplicate[root_b] && duplicate_edge;

        let new_root = if self.rank[root_a] < self.rank[root_b] {
            self.parent[root_a] = root_b;
            root_b
        } else if self.rank[root_a] > self.rank[root_b] {
            self.parent[root_b] = root_a;
            root_a
        } else {
            self.parent[root_b] = root_a;
            self.rank[root_a] += 1;
            root_a
        };

        self.all_duplicate[new_root] = merged_flag;
    }

    /// True if every edge recorded inside `x`'s component met the
    /// duplicate threshold.
    pub fn is_all_duplicate(&mut self, x: usize) -> bool {
        let root = self.find(x);
        self.all_duplicate[root]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons_are_disjoint() {
        let mut uf = UnionFind::new(3);
        assert_ne!(uf.find(0), uf.find(1));
        assert_ne!(uf.find(1), uf.find(2));
    }

    #[test]
    fn test_union_connects_transitively() {
        let mut uf = UnionFind::new(4);
        uf.union(0, 1, true);
        uf.union(1, 2, true);

        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(3));
    }

    #[test]
    fn test_all_duplicate_survives_duplicate_merges() {
        let mut uf = UnionFind::new(3);
        uf.union(0, 1, true);
        uf.union(1, 2, true);
        assert!(uf.is_all_duplicate(0));
    }

    #[test]
    fn test_one_weak_edge_clears_the_flag() {
        let mut uf = UnionFind::new(3);
        uf.union(0, 1, true);
        uf.union(1, 2, false);

        assert!(!uf.is_all_duplicate(0));
        assert!(!uf.is_all_duplicate(2));
    }

    #[test]
    fn test_weak_edge_inside_merged_component() {
        let mut uf = UnionFind::new(3);
        uf.union(0, 1, true);
        uf.union(1, 2, true);
        // A later edge between members already in one component still counts.
        uf.union(0, 2, false);

        assert!(!uf.is_all_duplicate(1));
    }
}
