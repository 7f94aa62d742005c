use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{DistanceTable, RoutingVector};
use crate::network::{Topology, Transport};
use crate::{Cost, INFINITY, NodeId};

/// How a node reacts when the cost of one of its direct links changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkChangePolicy {
    /// Accept the event and do nothing.
    #[default]
    Ignore,
    /// Adopt the new cost, recompute and re-announce on change. Cost
    /// increases can still count to infinity: there is no split horizon or
    /// poison reverse.
    Reconverge,
}

/// What a single event did to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Malformed input, dropped without touching the table.
    Rejected,
    /// Link change accepted but not acted upon.
    Ignored,
    /// Table processed, best costs unchanged, nothing sent.
    Unchanged,
    /// Best costs changed and the new vector went to every neighbor.
    Announced { recipients: usize },
}

impl UpdateOutcome {
    pub fn announced(&self) -> bool {
        matches!(self, UpdateOutcome::Announced { .. })
    }
}

/// One router of the distance-vector protocol.
///
/// The node owns its distance table and its row of direct link costs. It only
/// talks to the outside world through a [`Transport`].
#[derive(Debug, Clone)]
pub struct RoutingNode {
    id: NodeId,
    links: Vec<Cost>,
    table: DistanceTable,
    last_vectors: Vec<Option<Vec<Cost>>>,
    policy: LinkChangePolicy,
}

impl RoutingNode {
    /// Creates node `id` from its direct link costs (one entry per node).
    ///
    /// # Panics
    ///
    /// Panics if `id` is not an index into `links`.
    pub fn new(id: NodeId, links: Vec<Cost>, policy: LinkChangePolicy) -> Self {
        assert!(id < links.len(), "node {} outside a {} node network", id, links.len());
        let mut links: Vec<Cost> = links.into_iter().map(|c| c.min(INFINITY)).collect();
        if let Some(own) = links.get_mut(id) {
            *own = 0;
        }
        let table = DistanceTable::initialize(id, &links);
        let node_count = links.len();

        Self {
            id,
            links,
            table,
            last_vectors: vec![None; node_count],
            policy,
        }
    }

    /// Builds node `id` from its row of `topology`. Returns `None` when `id`
    /// is not part of the topology.
    pub fn from_topology(id: NodeId, topology: &Topology, policy: LinkChangePolicy) -> Option<Self> {
        topology
            .row(id)
            .map(|row| Self::new(id, row.to_vec(), policy))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node_count(&self) -> usize {
        self.links.len()
    }

    pub fn policy(&self) -> LinkChangePolicy {
        self.policy
    }

    pub fn table(&self) -> &DistanceTable {
        &self.table
    }

    pub fn link_cost(&self, neighbor: NodeId) -> Cost {
        self.links.get(neighbor).copied().unwrap_or(INFINITY)
    }

    /// Directly connected nodes, i.e. finite-cost links other than self.
    pub fn neighbors(&self) -> Vec<NodeId> {
        self.links
            .iter()
            .enumerate()
            .filter(|&(other, &cost)| other != self.id && cost < INFINITY)
            .map(|(other, _)| other)
            .collect()
    }

    pub fn distance_vector(&self) -> RoutingVector {
        RoutingVector::new(self.id, self.table.self_row().to_vec())
    }

    /// First hop on the current best route to `dest`. A direct link counts
    /// as going via `dest` itself; ties go to the lowest index.
    pub fn next_hop(&self, dest: NodeId) -> Option<NodeId> {
        if dest == self.id || dest >= self.node_count() {
            return None;
        }
        let best = self.table.best(dest);
        if best >= INFINITY {
            return None;
        }

        let direct = (self.links[dest] == best).then_some(dest);
        match (self.table.best_via(dest), direct) {
            (Some(via), Some(direct)) => Some(via.min(direct)),
            (via, direct) => via.or(direct),
        }
    }

    /// Reseeds the table from the direct links and announces it.
    pub fn init<T: Transport>(&mut self, transport: &mut T) -> UpdateOutcome {
        self.table = DistanceTable::initialize(self.id, &self.links);
        self.last_vectors = vec![None; self.node_count()];

        let recipients = self.broadcast(transport);
        info!("Node {} initialised, announced to {} neighbors", self.id, recipients);
        debug!("Initial distance table of node {}:\n{}", self.id, self.table_display());

        UpdateOutcome::Announced { recipients }
    }

    /// Folds a neighbor's vector into the table and re-announces when the
    /// best costs changed.
    pub fn on_vector_received<T: Transport>(&mut self, vector: &RoutingVector, transport: &mut T) -> UpdateOutcome {
        let Some(source) = vector.sender(self.node_count()) else {
            debug!("Node {} dropping vector from unknown source {}", self.id, vector.source);
            return UpdateOutcome::Rejected;
        };
        if source == self.id {
            debug!("Node {} dropping vector carrying its own id", self.id);
            return UpdateOutcome::Rejected;
        }
        if vector.costs.len() != self.node_count() {
            debug!(
                "Node {} dropping vector from {} with {} entries (expected {})",
                self.id,
                source,
                vector.costs.len(),
                self.node_count()
            );
            return UpdateOutcome::Rejected;
        }

        self.table.relax_row(source, self.links[source], &vector.costs);
        self.last_vectors[source] = Some(vector.costs.clone());

        if !self.table.recompute_self() {
            info!("No update in node {} (vector from {})", self.id, source);
            return UpdateOutcome::Unchanged;
        }

        let recipients = self.broadcast(transport);
        info!(
            "Node {} updated by vector from {}, announced to {} neighbors",
            self.id, source, recipients
        );
        debug!("Distance table of node {}:\n{}", self.id, self.table_display());

        UpdateOutcome::Announced { recipients }
    }

    /// Hook for a change of the direct link to `neighbor`. What happens
    /// depends on the node's [`LinkChangePolicy`].
    pub fn on_link_cost_changed<T: Transport>(
        &mut self,
        neighbor: NodeId,
        new_cost: Cost,
        transport: &mut T,
    ) -> UpdateOutcome {
        if neighbor >= self.node_count() || neighbor == self.id {
            warn!("Node {} ignoring link change towards invalid node {}", self.id, neighbor);
            return UpdateOutcome::Rejected;
        }
        if self.policy == LinkChangePolicy::Ignore {
            debug!(
                "Node {} ignoring link change to {} (cost {})",
                self.id, neighbor, new_cost
            );
            return UpdateOutcome::Ignored;
        }

        let new_cost = new_cost.min(INFINITY);
        let before = self.table.self_row().to_vec();
        let old_cost = std::mem::replace(&mut self.links[neighbor], new_cost);

        if let Some(vector) = &self.last_vectors[neighbor] {
            self.table.relax_row(neighbor, new_cost, vector);
        } else {
            let unknown = vec![INFINITY; self.node_count()];
            self.table.relax_row(neighbor, new_cost, &unknown);
        }
        self.table.set_best(neighbor, new_cost);
        self.table.recompute_self();

        if self.table.self_row() == before.as_slice() {
            info!(
                "Node {} link to {} changed {} -> {}, no update",
                self.id, neighbor, old_cost, new_cost
            );
            return UpdateOutcome::Unchanged;
        }

        let recipients = self.broadcast(transport);
        info!(
            "Node {} link to {} changed {} -> {}, announced to {} neighbors",
            self.id, neighbor, old_cost, new_cost, recipients
        );
        debug!("Distance table of node {}:\n{}", self.id, self.table_display());

        UpdateOutcome::Announced { recipients }
    }

    fn broadcast<T: Transport>(&self, transport: &mut T) -> usize {
        let neighbors = self.neighbors();
        for &neighbor in &neighbors {
            transport.send(neighbor, self.distance_vector());
        }
        neighbors.len()
    }

    fn table_display(&self) -> crate::report::TableSnapshot {
        crate::report::TableSnapshot::capture(self)
    }
}
