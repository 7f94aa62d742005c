//! Deterministic, single-threaded delivery of routing vectors.
//!
//! Every vector goes through one global FIFO queue, which keeps per-link
//! ordering intact. There is no clock: events are simply processed in the
//! order they were produced.

use std::collections::VecDeque;

use log::{debug, info, warn};
use thiserror::Error;

use crate::algorithms::all_pairs_costs;
use crate::network::{Topology, TopologyError, Transport};
use crate::protocol::{LinkChangePolicy, RoutingNode, RoutingVector, UpdateOutcome};
use crate::report::TableSnapshot;
use crate::{Cost, NodeId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("no convergence after {deliveries} deliveries ({pending} still queued)")]
    NotConverged { deliveries: usize, pending: usize },

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("node {node} disagrees with the shortest-path reference for destination {dest}: {actual} != {expected}")]
    Mismatch {
        node: NodeId,
        dest: NodeId,
        actual: Cost,
        expected: Cost,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: NodeId,
    pub to: NodeId,
    pub vector: RoutingVector,
}

/// Counters for one `run_until_quiescent` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergenceReport {
    pub deliveries: usize,
    pub announcements: usize,
    pub unchanged: usize,
    pub rejected: usize,
}

struct QueueTransport<'a> {
    from: NodeId,
    queue: &'a mut VecDeque<Envelope>,
}

impl Transport for QueueTransport<'_> {
    fn send(&mut self, to: NodeId, vector: RoutingVector) {
        self.queue.push_back(Envelope { from: self.from, to, vector });
    }
}

pub struct Simulation {
    topology: Topology,
    nodes: Vec<RoutingNode>,
    queue: VecDeque<Envelope>,
    total_deliveries: usize,
}

impl Simulation {
    pub fn new(topology: Topology, policy: LinkChangePolicy) -> Self {
        let nodes = (0..topology.node_count())
            .filter_map(|id| RoutingNode::from_topology(id, &topology, policy))
            .collect();

        Self {
            topology,
            nodes,
            queue: VecDeque::new(),
            total_deliveries: 0,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn nodes(&self) -> &[RoutingNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&RoutingNode> {
        self.nodes.get(id)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn total_deliveries(&self) -> usize {
        self.total_deliveries
    }

    /// Initializes every node in id order, queueing their first vectors.
    pub fn start(&mut self) {
        for node in &mut self.nodes {
            let mut transport = QueueTransport {
                from: node.id(),
                queue: &mut self.queue,
            };
            node.init(&mut transport);
        }
        info!(
            "Simulation started with {} nodes, {} vectors queued",
            self.nodes.len(),
            self.queue.len()
        );
    }

    /// Injects a vector as if it had been sent to `to`. Used to replay or
    /// forge traffic.
    pub fn inject(&mut self, to: NodeId, vector: RoutingVector) {
        let from = vector.sender(self.nodes.len()).unwrap_or(to);
        self.queue.push_back(Envelope { from, to, vector });
    }

    /// Delivers the oldest queued vector. Returns `None` when the queue is
    /// empty.
    pub fn step(&mut self) -> Option<(Envelope, UpdateOutcome)> {
        let envelope = self.queue.pop_front()?;
        self.total_deliveries += 1;

        let outcome = match self.nodes.get_mut(envelope.to) {
            Some(node) => {
                let mut transport = QueueTransport {
                    from: envelope.to,
                    queue: &mut self.queue,
                };
                node.on_vector_received(&envelope.vector, &mut transport)
            }
            None => {
                warn!("Dropping vector addressed to unknown node {}", envelope.to);
                UpdateOutcome::Rejected
            }
        };
        debug!("Delivered {} -> {}: {:?}", envelope.from, envelope.to, outcome);

        Some((envelope, outcome))
    }

    /// Delivers until no vector is in flight.
    pub fn run_until_quiescent(&mut self, max_deliveries: usize) -> Result<ConvergenceReport, SimulationError> {
        let mut report = ConvergenceReport::default();

        while !self.queue.is_empty() {
            if report.deliveries >= max_deliveries {
                return Err(SimulationError::NotConverged {
                    deliveries: report.deliveries,
                    pending: self.queue.len(),
                });
            }
            if let Some((_, outcome)) = self.step() {
                report.deliveries += 1;
                match outcome {
                    UpdateOutcome::Announced { .. } => report.announcements += 1,
                    UpdateOutcome::Unchanged | UpdateOutcome::Ignored => report.unchanged += 1,
                    UpdateOutcome::Rejected => report.rejected += 1,
                }
            }
        }

        info!(
            "Converged after {} deliveries ({} triggered updates)",
            report.deliveries, report.announcements
        );
        Ok(report)
    }

    /// Changes the link `a -> b` (and `b -> a` when `bidirectional`), then
    /// notifies the affected endpoints. A change that would leave an invalid
    /// topology is rejected before any node hears of it.
    pub fn change_link(&mut self, a: NodeId, b: NodeId, cost: Cost, bidirectional: bool) -> Result<(), SimulationError> {
        self.topology.apply_link_change(a, b, cost, bidirectional)?;
        info!("Link {} -> {} now costs {}", a, b, cost);

        let mut endpoints = vec![(a, b)];
        if bidirectional {
            endpoints.push((b, a));
        }
        for (owner, neighbor) in endpoints {
            let mut transport = QueueTransport {
                from: owner,
                queue: &mut self.queue,
            };
            self.nodes[owner].on_link_cost_changed(neighbor, cost, &mut transport);
        }
        Ok(())
    }

    pub fn snapshot(&self, id: NodeId) -> Option<TableSnapshot> {
        self.nodes.get(id).map(TableSnapshot::capture)
    }

    pub fn snapshots(&self) -> Vec<TableSnapshot> {
        self.nodes.iter().map(TableSnapshot::capture).collect()
    }

    /// Each node's current best cost to every destination.
    pub fn best_costs(&self) -> Vec<Vec<Cost>> {
        self.nodes
            .iter()
            .map(|node| node.table().self_row().to_vec())
            .collect()
    }

    /// Compares every node's best costs with a centralized shortest-path
    /// computation over the current topology.
    pub fn verify(&self) -> Result<(), SimulationError> {
        let expected = all_pairs_costs(&self.topology);
        for (node, row) in self.best_costs().iter().enumerate() {
            for (dest, &actual) in row.iter().enumerate() {
                if actual != expected[node][dest] {
                    return Err(SimulationError::Mismatch {
                        node,
                        dest,
                        actual,
                        expected: expected[node][dest],
                    });
                }
            }
        }
        Ok(())
    }
}
