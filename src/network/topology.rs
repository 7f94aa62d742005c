use serde::Serialize;
use thiserror::Error;

use crate::{Cost, INFINITY, NodeId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("topology must contain at least one node")]
    Empty,

    #[error("node {node} out of range (node count {node_count})")]
    NodeOutOfRange { node: NodeId, node_count: usize },

    #[error("row {row} has {actual} entries, expected {expected}")]
    RowLength { row: usize, expected: usize, actual: usize },

    #[error("link {from} -> {to} has cost {cost}, above the infinity sentinel {}", INFINITY)]
    CostTooLarge { from: NodeId, to: NodeId, cost: Cost },

    #[error("self link on node {node} must cost 0, got {cost}")]
    SelfLink { node: NodeId, cost: Cost },

    #[error("worst-case path sum {total} reaches the infinity sentinel {}", INFINITY)]
    InfinityHeadroom { total: u64 },

    #[error("link {from} -> {to} has no return link")]
    OneWayLink { from: NodeId, to: NodeId },
}

/// Direct link costs between every ordered pair of nodes.
///
/// `INFINITY` means "no direct link". The diagonal is always 0. The two
/// directions of a link may cost differently, but a valid topology has no
/// link that exists in one direction only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    costs: Vec<Vec<Cost>>,
}

impl Topology {
    /// A topology of `node_count` isolated nodes.
    pub fn new(node_count: usize) -> Self {
        let costs = (0..node_count)
            .map(|i| {
                (0..node_count)
                    .map(|j| if i == j { 0 } else { INFINITY })
                    .collect()
            })
            .collect();
        Self { costs }
    }

    /// The four node network used throughout the documentation:
    /// `0-1:1, 0-2:3, 0-3:7, 1-2:1, 2-3:2`, with no link between 1 and 3.
    pub fn reference() -> Self {
        let mut topology = Self::new(4);
        for (a, b, cost) in [(0, 1, 1), (0, 2, 3), (0, 3, 7), (1, 2, 1), (2, 3, 2)] {
            topology.costs[a][b] = cost;
            topology.costs[b][a] = cost;
        }
        topology
    }

    pub fn from_matrix(costs: Vec<Vec<Cost>>) -> Result<Self, TopologyError> {
        let node_count = costs.len();
        if node_count == 0 {
            return Err(TopologyError::Empty);
        }

        for (row, entries) in costs.iter().enumerate() {
            if entries.len() != node_count {
                return Err(TopologyError::RowLength {
                    row,
                    expected: node_count,
                    actual: entries.len(),
                });
            }
            for (col, &cost) in entries.iter().enumerate() {
                check_cost(row, col, cost)?;
            }
        }

        let topology = Self { costs };
        topology.validate()?;
        Ok(topology)
    }

    pub fn node_count(&self) -> usize {
        self.costs.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node < self.node_count()
    }

    /// Cost of the direct link `from -> to`, `INFINITY` when there is none or
    /// either id is out of range.
    pub fn link_cost(&self, from: NodeId, to: NodeId) -> Cost {
        self.costs
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(INFINITY)
    }

    /// Direct link costs from `node` to every node.
    pub fn row(&self, node: NodeId) -> Option<&[Cost]> {
        self.costs.get(node).map(Vec::as_slice)
    }

    /// Nodes reachable from `node` over one finite-cost link.
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.row(node)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|&(other, &cost)| other != node && cost < INFINITY)
                    .map(|(other, _)| other)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sets the directed link `from -> to`. `INFINITY` removes the link.
    pub fn set_link(&mut self, from: NodeId, to: NodeId, cost: Cost) -> Result<(), TopologyError> {
        let node_count = self.node_count();
        for node in [from, to] {
            if !self.contains(node) {
                return Err(TopologyError::NodeOutOfRange { node, node_count });
            }
        }
        check_cost(from, to, cost)?;
        self.costs[from][to] = cost;
        Ok(())
    }

    pub fn set_bidirectional_link(&mut self, a: NodeId, b: NodeId, cost: Cost) -> Result<(), TopologyError> {
        self.set_link(a, b, cost)?;
        self.set_link(b, a, cost)
    }

    /// Applies a link change only if the resulting topology still validates.
    pub fn apply_link_change(
        &mut self,
        a: NodeId,
        b: NodeId,
        cost: Cost,
        bidirectional: bool,
    ) -> Result<(), TopologyError> {
        let mut changed = self.clone();
        if bidirectional {
            changed.set_bidirectional_link(a, b, cost)?;
        } else {
            changed.set_link(a, b, cost)?;
        }
        changed.validate()?;
        *self = changed;
        Ok(())
    }

    /// Checks that every link has a return link and that no simple path can
    /// reach the `INFINITY` sentinel.
    ///
    /// A simple path crosses at most `node_count - 1` links, so the sum of
    /// that many of the most expensive pairs (taking the larger direction)
    /// bounds every real path cost.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let node_count = self.node_count();
        let mut pair_costs = Vec::new();
        for a in 0..node_count {
            for b in (a + 1)..node_count {
                let (forward, backward) = (self.costs[a][b], self.costs[b][a]);
                match (forward < INFINITY, backward < INFINITY) {
                    (true, true) => pair_costs.push(forward.max(backward)),
                    (true, false) => return Err(TopologyError::OneWayLink { from: a, to: b }),
                    (false, true) => return Err(TopologyError::OneWayLink { from: b, to: a }),
                    (false, false) => {}
                }
            }
        }

        pair_costs.sort_unstable_by(|x, y| y.cmp(x));
        let total: u64 = pair_costs
            .iter()
            .take(node_count.saturating_sub(1))
            .map(|&cost| u64::from(cost))
            .sum();

        if total >= u64::from(INFINITY) {
            return Err(TopologyError::InfinityHeadroom { total });
        }
        Ok(())
    }
}

fn check_cost(from: NodeId, to: NodeId, cost: Cost) -> Result<(), TopologyError> {
    if cost > INFINITY {
        return Err(TopologyError::CostTooLarge { from, to, cost });
    }
    if from == to && cost != 0 {
        return Err(TopologyError::SelfLink { node: from, cost });
    }
    Ok(())
}
