use serde::{Deserialize, Serialize};

use crate::{Cost, NodeId};

/// A node's announced belief of its own best cost to every destination.
///
/// The source id is signed on the wire so that malformed ids (such as -1)
/// decode successfully and are rejected by the receiving node instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingVector {
    pub source: i32,
    pub costs: Vec<Cost>,
}

impl RoutingVector {
    pub fn new(source: NodeId, costs: Vec<Cost>) -> Self {
        Self {
            source: i32::try_from(source).unwrap_or(i32::MAX),
            costs,
        }
    }

    /// The sender id if it is a valid node of a `node_count` node network.
    pub fn sender(&self, node_count: usize) -> Option<NodeId> {
        usize::try_from(self.source)
            .ok()
            .filter(|&id| id < node_count)
    }
}
