use serde::Serialize;

use crate::{Cost, INFINITY, NodeId, add_costs};

/// Per-node `costs[via][dest]` matrix.
///
/// Row `owner` doubles as the direct-link row at start-up and as the node's
/// current best cost per destination afterwards; it is the row that gets
/// announced. Every other row holds "cost to dest when routed through via"
/// as last learned from `via`. Entries always lie in `0..=INFINITY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistanceTable {
    owner: NodeId,
    costs: Vec<Vec<Cost>>,
}

impl DistanceTable {
    /// Seeds the owner row from its direct links; all other rows start
    /// unknown.
    pub fn initialize(owner: NodeId, links: &[Cost]) -> Self {
        let node_count = links.len();
        let mut costs = vec![vec![INFINITY; node_count]; node_count];
        for (dest, &cost) in links.iter().enumerate() {
            costs[owner][dest] = if dest == owner { 0 } else { cost.min(INFINITY) };
        }
        Self { owner, costs }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn node_count(&self) -> usize {
        self.costs.len()
    }

    pub fn cost(&self, via: NodeId, dest: NodeId) -> Cost {
        self.costs
            .get(via)
            .and_then(|row| row.get(dest))
            .copied()
            .unwrap_or(INFINITY)
    }

    pub fn row(&self, via: NodeId) -> Option<&[Cost]> {
        self.costs.get(via).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<Cost>] {
        &self.costs
    }

    /// Current best cost to every destination.
    pub fn self_row(&self) -> &[Cost] {
        &self.costs[self.owner]
    }

    pub fn best(&self, dest: NodeId) -> Cost {
        self.cost(self.owner, dest)
    }

    /// Replaces everything known about routes through `from` with
    /// `link_cost + vector[dest]`, saturating at `INFINITY`.
    ///
    /// Missing vector entries count as unreachable. Relaxing the owner row
    /// or an unknown row is a no-op.
    pub fn relax_row(&mut self, from: NodeId, link_cost: Cost, vector: &[Cost]) {
        if from == self.owner || from >= self.node_count() {
            return;
        }
        let row = &mut self.costs[from];
        for (dest, entry) in row.iter_mut().enumerate() {
            let advertised = vector.get(dest).copied().unwrap_or(INFINITY);
            *entry = add_costs(link_cost, advertised);
        }
    }

    /// Overwrites the owner's entry for `dest`, e.g. after its direct link
    /// changed. The owner's own entry stays 0.
    pub fn set_best(&mut self, dest: NodeId, cost: Cost) {
        if dest == self.owner || dest >= self.node_count() {
            return;
        }
        self.costs[self.owner][dest] = cost.min(INFINITY);
    }

    /// Folds every row into the owner row. Returns whether any entry changed.
    pub fn recompute_self(&mut self) -> bool {
        let mut changed = false;
        for dest in 0..self.node_count() {
            let best = self
                .costs
                .iter()
                .map(|row| row[dest])
                .min()
                .unwrap_or(INFINITY);
            if best != self.costs[self.owner][dest] {
                self.costs[self.owner][dest] = best;
                changed = true;
            }
        }
        changed
    }

    /// Lowest-index non-owner row achieving the current best cost to `dest`.
    pub fn best_via(&self, dest: NodeId) -> Option<NodeId> {
        let best = self.best(dest);
        if best >= INFINITY {
            return None;
        }
        (0..self.node_count())
            .filter(|&via| via != self.owner)
            .find(|&via| self.costs[via][dest] == best)
    }
}
