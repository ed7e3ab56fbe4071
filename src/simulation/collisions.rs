//! Pending-collision registry.
//!
//! During force evaluation, overlapping pairs are registered here; at the end
//! of the step the registry is drained into disjoint clusters and each cluster
//! is merged into a single body. Backed by a path-compressed union-find keyed
//! on body index, so a fan of simultaneous discoveries ((0,1), (2,3), (1,2))
//! still materializes as one cluster whatever the discovery order.

use std::collections::BTreeMap;

/// Disjoint sets of body indices discovered to be touching this step.
#[derive(Debug, Default)]
pub struct CollisionRegistry {
    parent: BTreeMap<usize, usize>,
}

impl CollisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that bodies `a` and `b` are in contact.
    pub fn register(&mut self, a: usize, b: usize) {
        self.parent.entry(a).or_insert(a);
        self.parent.entry(b).or_insert(b);
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // union by index keeps the smallest index as the root
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent.insert(hi, lo);
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        loop {
            let p = self.parent[&i];
            if p == i {
                return i;
            }
            // path halving: point i at its grandparent and step up
            let gp = self.parent[&p];
            self.parent.insert(i, gp);
            i = gp;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Drain the registry into clusters of at least two members, each sorted
    /// ascending; clusters come out ordered by their smallest index.
    pub fn take_clusters(&mut self) -> Vec<Vec<usize>> {
        let members: Vec<usize> = self.parent.keys().copied().collect();
        let mut clusters: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in members {
            let root = self.find(i);
            clusters.entry(root).or_default().push(i);
        }
        self.parent.clear();
        // BTreeMap iteration gives ascending member order per cluster already
        clusters.into_values().filter(|c| c.len() > 1).collect()
    }
}
