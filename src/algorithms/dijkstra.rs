use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::network::Topology;
use crate::{Cost, INFINITY, NodeId, add_costs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortestPath {
    pub cost: Cost,
    pub next_hop: Option<NodeId>,
}

#[derive(Debug, PartialEq, Eq)]
struct State {
    cost: Cost,
    node: NodeId,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Centralized shortest paths from `source` over the whole topology.
///
/// Unreachable destinations get cost `INFINITY` and no next hop.
pub fn shortest_paths_from(topology: &Topology, source: NodeId) -> Vec<ShortestPath> {
    let node_count = topology.node_count();
    let mut distances = vec![INFINITY; node_count];
    let mut first_hop: Vec<Option<NodeId>> = vec![None; node_count];
    let mut heap = BinaryHeap::new();

    if source >= node_count {
        return Vec::new();
    }

    distances[source] = 0;
    heap.push(State { cost: 0, node: source });

    while let Some(State { cost, node }) = heap.pop() {
        // Skip if we've already found a better path
        if cost > distances[node] {
            continue;
        }

        for neighbor in topology.neighbors(node) {
            let new_cost = add_costs(cost, topology.link_cost(node, neighbor));
            if new_cost >= INFINITY {
                continue;
            }

            let hop = if node == source { Some(neighbor) } else { first_hop[node] };
            let better = new_cost < distances[neighbor]
                || (new_cost == distances[neighbor] && hop < first_hop[neighbor]);
            if better {
                distances[neighbor] = new_cost;
                first_hop[neighbor] = hop;
                heap.push(State { cost: new_cost, node: neighbor });
            }
        }
    }

    distances
        .into_iter()
        .zip(first_hop)
        .map(|(cost, next_hop)| ShortestPath { cost, next_hop })
        .collect()
}

/// `result[a][b]` is the least cost from `a` to `b`.
pub fn all_pairs_costs(topology: &Topology) -> Vec<Vec<Cost>> {
    (0..topology.node_count())
        .map(|source| {
            shortest_paths_from(topology, source)
                .into_iter()
                .map(|path| path.cost)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_shortest_costs() {
        let costs = all_pairs_costs(&Topology::reference());
        assert_eq!(
            costs,
            vec![
                vec![0, 1, 2, 4],
                vec![1, 0, 1, 3],
                vec![2, 1, 0, 2],
                vec![4, 3, 2, 0],
            ]
        );
    }

    #[test]
    fn test_next_hop_from_source() {
        let paths = shortest_paths_from(&Topology::reference(), 0);
        assert_eq!(paths[0].next_hop, None);
        assert_eq!(paths[1].next_hop, Some(1));
        assert_eq!(paths[2].next_hop, Some(1));
        assert_eq!(paths[3].next_hop, Some(1));
    }

    #[test]
    fn test_unreachable_is_infinity() {
        let mut topology = Topology::new(3);
        topology.set_bidirectional_link(0, 1, 4).unwrap();
        let paths = shortest_paths_from(&topology, 0);
        assert_eq!(paths[1].cost, 4);
        assert_eq!(paths[2].cost, INFINITY);
        assert_eq!(paths[2].next_hop, None);
    }

    #[test]
    fn test_directed_links() {
        let mut topology = Topology::new(2);
        topology.set_link(0, 1, 3).unwrap();
        assert_eq!(all_pairs_costs(&topology), vec![vec![0, 3], vec![INFINITY, 0]]);
    }
}
