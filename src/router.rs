//! Actor runtime: one tokio task per routing node.
//!
//! Each node task exclusively owns its [`RoutingNode`] and drains an unbounded
//! inbox, so messages from one sender to one receiver stay in order. A shared
//! in-flight counter, published on a `watch` channel, tells when the whole
//! network has gone quiet.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::algorithms::all_pairs_costs;
use crate::network::{Topology, Transport};
use crate::protocol::{LinkChangePolicy, RoutingNode, RoutingVector, UpdateOutcome};
use crate::report::TableSnapshot;
use crate::{Cost, NodeId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traffic {
    /// Commands queued in some inbox and not yet processed.
    pub in_flight: usize,
    pub delivered: u64,
    pub announcements: u64,
}

#[derive(Debug)]
pub enum NodeCommand {
    Vector(RoutingVector),
    LinkCostChanged { neighbor: NodeId, cost: Cost },
    Snapshot(oneshot::Sender<TableSnapshot>),
    Shutdown,
}

type Inboxes = Arc<Vec<mpsc::UnboundedSender<NodeCommand>>>;

struct ChannelTransport {
    peers: Inboxes,
    traffic: Arc<watch::Sender<Traffic>>,
}

impl Transport for ChannelTransport {
    fn send(&mut self, to: NodeId, vector: RoutingVector) {
        let Some(peer) = self.peers.get(to) else {
            warn!("No inbox for node {}, dropping vector", to);
            return;
        };

        self.traffic.send_modify(|t| t.in_flight += 1);
        if peer.send(NodeCommand::Vector(vector)).is_err() {
            self.traffic
                .send_modify(|t| t.in_flight = t.in_flight.saturating_sub(1));
            warn!("Node {} inbox closed, vector lost", to);
        }
    }
}

pub struct RouterNetwork {
    topology: Topology,
    peers: Inboxes,
    traffic_tx: Arc<watch::Sender<Traffic>>,
    traffic_rx: watch::Receiver<Traffic>,
    handles: Vec<JoinHandle<RoutingNode>>,
}

impl RouterNetwork {
    /// Spawns one task per node of `topology`; every node starts by running
    /// `init`. Must be called from within a tokio runtime.
    pub fn spawn(topology: Topology, policy: LinkChangePolicy) -> Self {
        let node_count = topology.node_count();
        let (traffic_tx, traffic_rx) = watch::channel(Traffic {
            in_flight: node_count,
            ..Traffic::default()
        });
        let traffic_tx = Arc::new(traffic_tx);

        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..node_count).map(|_| mpsc::unbounded_channel()).unzip();
        let peers: Inboxes = Arc::new(senders);

        let mut handles = Vec::with_capacity(node_count);
        for (id, inbox) in receivers.into_iter().enumerate() {
            let Some(node) = RoutingNode::from_topology(id, &topology, policy) else {
                continue;
            };
            let transport = ChannelTransport {
                peers: peers.clone(),
                traffic: traffic_tx.clone(),
            };
            let span = info_span!("node", id);
            handles.push(tokio::spawn(run_node(node, inbox, transport).instrument(span)));
        }

        info!("Spawned {} routing node tasks", handles.len());

        Self {
            topology,
            peers,
            traffic_tx,
            traffic_rx,
            handles,
        }
    }

    pub fn node_count(&self) -> usize {
        self.peers.len()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn traffic(&self) -> Traffic {
        *self.traffic_rx.borrow()
    }

    /// Waits until no command is queued anywhere.
    pub async fn wait_for_convergence(&self, timeout: Duration) -> Result<Traffic> {
        let mut rx = self.traffic_rx.clone();
        let waiting = async move {
            let traffic = *rx.wait_for(|t| t.in_flight == 0).await?;
            Ok::<_, watch::error::RecvError>(traffic)
        };

        match tokio::time::timeout(timeout, waiting).await {
            Ok(result) => {
                let traffic = result.context("traffic channel closed")?;
                info!(
                    "Network quiescent after {} deliveries ({} triggered updates)",
                    traffic.delivered, traffic.announcements
                );
                Ok(traffic)
            }
            Err(_) => bail!(
                "no convergence within {:?} ({} commands still in flight)",
                timeout,
                self.traffic().in_flight
            ),
        }
    }

    /// Queues a vector for `to` as if a neighbor had sent it.
    pub fn inject(&self, to: NodeId, vector: RoutingVector) -> Result<()> {
        self.dispatch(to, NodeCommand::Vector(vector))
    }

    /// Updates the topology and notifies the endpoints of the changed link.
    /// Fails without notifying anyone if the new topology would be invalid.
    pub fn change_link(&mut self, a: NodeId, b: NodeId, cost: Cost, bidirectional: bool) -> Result<()> {
        self.topology.apply_link_change(a, b, cost, bidirectional)?;
        info!("Link {} -> {} now costs {}", a, b, cost);

        self.dispatch(a, NodeCommand::LinkCostChanged { neighbor: b, cost })?;
        if bidirectional {
            self.dispatch(b, NodeCommand::LinkCostChanged { neighbor: a, cost })?;
        }
        Ok(())
    }

    pub async fn snapshot(&self, id: NodeId) -> Result<TableSnapshot> {
        let inbox = self
            .peers
            .get(id)
            .ok_or_else(|| anyhow!("unknown node {}", id))?;
        let (reply_tx, reply_rx) = oneshot::channel();
        inbox
            .send(NodeCommand::Snapshot(reply_tx))
            .map_err(|_| anyhow!("node {} task has stopped", id))?;
        reply_rx
            .await
            .with_context(|| format!("node {} dropped the snapshot request", id))
    }

    pub async fn snapshots(&self) -> Result<Vec<TableSnapshot>> {
        let mut snapshots = Vec::with_capacity(self.node_count());
        for id in 0..self.node_count() {
            snapshots.push(self.snapshot(id).await?);
        }
        Ok(snapshots)
    }

    /// Checks every node's best costs against a centralized shortest-path
    /// computation over the current topology.
    pub async fn verify(&self) -> Result<()> {
        let expected = all_pairs_costs(&self.topology);
        for snapshot in self.snapshots().await? {
            let actual = snapshot.best_costs();
            if actual != expected[snapshot.node].as_slice() {
                bail!(
                    "node {} converged to {:?}, shortest paths are {:?}",
                    snapshot.node,
                    actual,
                    expected[snapshot.node]
                );
            }
        }
        Ok(())
    }

    /// Stops every node task and hands back the final node state.
    pub async fn shutdown(self) -> Result<Vec<RoutingNode>> {
        for inbox in self.peers.iter() {
            let _ = inbox.send(NodeCommand::Shutdown);
        }

        let mut nodes = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            nodes.push(handle.await?);
        }
        info!("All routing node tasks stopped");
        Ok(nodes)
    }

    fn dispatch(&self, to: NodeId, command: NodeCommand) -> Result<()> {
        let inbox = self
            .peers
            .get(to)
            .ok_or_else(|| anyhow!("unknown node {}", to))?;
        self.traffic_tx.send_modify(|t| t.in_flight += 1);
        if inbox.send(command).is_err() {
            self.traffic_tx
                .send_modify(|t| t.in_flight = t.in_flight.saturating_sub(1));
            bail!("node {} task has stopped", to);
        }
        Ok(())
    }
}

async fn run_node(
    mut node: RoutingNode,
    mut inbox: mpsc::UnboundedReceiver<NodeCommand>,
    mut transport: ChannelTransport,
) -> RoutingNode {
    let outcome = node.init(&mut transport);
    settle(&transport.traffic, outcome, false);

    while let Some(command) = inbox.recv().await {
        match command {
            NodeCommand::Vector(vector) => {
                let outcome = node.on_vector_received(&vector, &mut transport);
                settle(&transport.traffic, outcome, true);
            }
            NodeCommand::LinkCostChanged { neighbor, cost } => {
                let outcome = node.on_link_cost_changed(neighbor, cost, &mut transport);
                settle(&transport.traffic, outcome, false);
            }
            NodeCommand::Snapshot(reply) => {
                if reply.send(TableSnapshot::capture(&node)).is_err() {
                    debug!("Snapshot requester went away");
                }
            }
            NodeCommand::Shutdown => {
                debug!("Node task shutting down");
                break;
            }
        }
    }

    node
}

fn settle(traffic: &watch::Sender<Traffic>, outcome: UpdateOutcome, delivery: bool) {
    traffic.send_modify(|t| {
        t.in_flight = t.in_flight.saturating_sub(1);
        if delivery {
            t.delivered += 1;
        }
        if outcome.announced() {
            t.announcements += 1;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::INFINITY;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_reference_network_converges() {
        let network = RouterNetwork::spawn(Topology::reference(), LinkChangePolicy::Ignore);
        let traffic = network.wait_for_convergence(WAIT).await.unwrap();

        assert_eq!(traffic.in_flight, 0);
        assert!(traffic.delivered >= 10);
        network.verify().await.unwrap();

        let nodes = network.shutdown().await.unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0].table().self_row(), &[0, 1, 2, 4]);
    }

    #[tokio::test]
    async fn test_snapshot_of_unknown_node_fails() {
        let network = RouterNetwork::spawn(Topology::reference(), LinkChangePolicy::Ignore);
        assert!(network.snapshot(9).await.is_err());
        network.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_garbage_is_dropped() {
        let network = RouterNetwork::spawn(Topology::reference(), LinkChangePolicy::Ignore);
        network.wait_for_convergence(WAIT).await.unwrap();
        let before = network.snapshot(2).await.unwrap();

        network
            .inject(2, RoutingVector { source: 4, costs: vec![0; 4] })
            .unwrap();
        let traffic = network.wait_for_convergence(WAIT).await.unwrap();

        let after = network.snapshot(2).await.unwrap();
        assert_eq!(before.costs, after.costs);
        assert_eq!(traffic.in_flight, 0);
        network.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_link_change_reconverges() {
        let mut network = RouterNetwork::spawn(Topology::reference(), LinkChangePolicy::Reconverge);
        network.wait_for_convergence(WAIT).await.unwrap();

        network.change_link(0, 3, 1, true).unwrap();
        network.wait_for_convergence(WAIT).await.unwrap();
        network.verify().await.unwrap();

        let snapshot = network.snapshot(1).await.unwrap();
        assert_eq!(snapshot.best_costs(), &[1, 0, 1, 2]);
        assert_ne!(snapshot.best_costs()[3], INFINITY);
        network.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_one_way_link_change_is_refused() {
        let mut network = RouterNetwork::spawn(Topology::reference(), LinkChangePolicy::Reconverge);
        network.wait_for_convergence(WAIT).await.unwrap();

        assert!(network.change_link(1, 3, 1, false).is_err());
        assert_eq!(network.topology(), &Topology::reference());
        assert_eq!(network.traffic().in_flight, 0);
        network.verify().await.unwrap();
        network.shutdown().await.unwrap();
    }
}
