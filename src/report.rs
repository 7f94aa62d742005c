use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::protocol::RoutingNode;
use crate::{Cost, INFINITY, NodeId};

/// Read-only copy of one node's distance table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSnapshot {
    pub node: NodeId,
    pub neighbors: Vec<NodeId>,
    /// `costs[via][dest]`, row `node` holding the best costs.
    pub costs: Vec<Vec<Cost>>,
    pub next_hops: Vec<Option<NodeId>>,
    pub captured_at: DateTime<Utc>,
}

impl TableSnapshot {
    pub fn capture(node: &RoutingNode) -> Self {
        Self {
            node: node.id(),
            neighbors: node.neighbors(),
            costs: node.table().rows().to_vec(),
            next_hops: (0..node.node_count()).map(|dest| node.next_hop(dest)).collect(),
            captured_at: Utc::now(),
        }
    }

    pub fn best_costs(&self) -> &[Cost] {
        &self.costs[self.node]
    }
}

fn cell(cost: Cost) -> String {
    if cost >= INFINITY {
        "inf".to_string()
    } else {
        cost.to_string()
    }
}

/// Renders the via x dest grid restricted to neighbor columns, followed by
/// the best cost and next hop per destination.
impl fmt::Display for TableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8} |", format!("D{}", self.node))?;
        for via in &self.neighbors {
            write!(f, " {:>5}", format!("via {}", via))?;
        }
        writeln!(f, " | {:>5} {:>5}", "best", "hop")?;
        writeln!(f, "{}", "-".repeat(10 + 6 * self.neighbors.len() + 14))?;

        for dest in (0..self.costs.len()).filter(|&d| d != self.node) {
            write!(f, "{:>8} |", format!("dest {}", dest))?;
            for &via in &self.neighbors {
                write!(f, " {:>5}", cell(self.costs[via][dest]))?;
            }
            let hop = self.next_hops[dest]
                .map(|h| h.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(f, " | {:>5} {:>5}", cell(self.costs[self.node][dest]), hop)?;
        }
        Ok(())
    }
}

/// Renders a best-cost matrix, one row per node.
pub struct CostMatrix<'a>(pub &'a [Vec<Cost>]);

impl fmt::Display for CostMatrix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.0;
        write!(f, "{:>8}", "from\\to")?;
        for dest in 0..rows.len() {
            write!(f, " {:>5}", dest)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", "-".repeat(8 + 6 * rows.len()))?;
        for (node, row) in rows.iter().enumerate() {
            write!(f, "{:>8}", node)?;
            for &cost in row {
                write!(f, " {:>5}", cell(cost))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinkChangePolicy;
    use crate::network::{RecordingTransport, Topology};
    use crate::protocol::RoutingVector;

    #[test]
    fn test_capture_reflects_node_state() {
        let mut node = RoutingNode::from_topology(1, &Topology::reference(), LinkChangePolicy::Ignore).unwrap();
        let mut transport = RecordingTransport::new();
        node.init(&mut transport);
        node.on_vector_received(&RoutingVector::new(2, vec![3, 1, 0, 2]), &mut transport);

        let snapshot = TableSnapshot::capture(&node);
        assert_eq!(snapshot.node, 1);
        assert_eq!(snapshot.neighbors, vec![0, 2]);
        assert_eq!(snapshot.best_costs(), &[1, 0, 1, 3]);
        assert_eq!(snapshot.next_hops, vec![Some(0), None, Some(2), Some(2)]);
    }

    #[test]
    fn test_display_lists_neighbor_columns() {
        let node = RoutingNode::from_topology(1, &Topology::reference(), LinkChangePolicy::Ignore).unwrap();
        let rendered = TableSnapshot::capture(&node).to_string();

        assert!(rendered.contains("via 0"));
        assert!(rendered.contains("via 2"));
        assert!(!rendered.contains("via 3"));
        assert!(rendered.contains("dest 3"));
        assert!(!rendered.contains("dest 1"));
        assert!(rendered.contains("inf"));
    }

    #[test]
    fn test_cost_matrix_display() {
        let rows = [vec![0, 4], vec![INFINITY, 0]];
        let rendered = CostMatrix(&rows).to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].ends_with("4"));
        assert!(lines[0].starts_with(" from\\to"));
        assert!(lines[3].contains("inf"));
    }
}
