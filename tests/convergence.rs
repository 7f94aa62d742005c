use std::collections::{BTreeMap, VecDeque};

use custom_dv::algorithms::all_pairs_costs;
use custom_dv::network::{RecordingTransport, Topology};
use custom_dv::protocol::{LinkChangePolicy, RoutingNode, RoutingVector};
use custom_dv::{INFINITY, NodeId, Simulation, SimulationError};

fn converge(topology: Topology) -> Simulation {
    let mut sim = Simulation::new(topology, LinkChangePolicy::Ignore);
    sim.start();
    sim.run_until_quiescent(100_000).unwrap();
    sim
}

fn ring(node_count: usize) -> Topology {
    let mut topology = Topology::new(node_count);
    for i in 0..node_count {
        let cost = (i as u32 % 4) + 1;
        topology
            .set_bidirectional_link(i, (i + 1) % node_count, cost)
            .unwrap();
    }
    topology
}

fn mesh(node_count: usize) -> Topology {
    let mut topology = Topology::new(node_count);
    for a in 0..node_count {
        for b in (a + 1)..node_count {
            let cost = ((a * 7 + b * 3) % 9 + 1) as u32;
            topology.set_bidirectional_link(a, b, cost).unwrap();
        }
    }
    topology
}

#[test]
fn test_reference_topology_matches_direct_computation() {
    let sim = converge(Topology::reference());
    sim.verify().unwrap();

    let best = sim.best_costs();
    assert_eq!(best[0][3], 4, "0 -> 1 -> 2 -> 3 beats the direct link of 7");
    assert_eq!(best[1][3], 3, "1 -> 2 -> 3");
    assert_eq!(best[0][2], 2, "0 -> 1 -> 2 beats the direct link of 3");
    assert_eq!(best[3][0], 4);
    assert_eq!(sim.node(0).unwrap().next_hop(3), Some(1));
    assert_eq!(sim.node(3).unwrap().next_hop(1), Some(2));
}

#[test]
fn test_other_topologies_converge_to_shortest_paths() {
    for topology in [ring(6), mesh(5), ring(2), Topology::new(1)] {
        let expected = all_pairs_costs(&topology);
        let sim = converge(topology);
        assert_eq!(sim.best_costs(), expected);
    }
}

#[test]
fn test_asymmetric_links_converge() {
    let mut topology = Topology::new(3);
    topology.set_link(0, 1, 1).unwrap();
    topology.set_link(1, 0, 5).unwrap();
    topology.set_link(1, 2, 1).unwrap();
    topology.set_link(2, 1, 1).unwrap();
    topology.set_link(2, 0, 1).unwrap();
    topology.set_link(0, 2, 9).unwrap();

    let sim = converge(topology);
    sim.verify().unwrap();
    assert_eq!(sim.best_costs()[0], vec![0, 1, 2]);
    assert_eq!(sim.best_costs()[1], vec![2, 0, 1]);
}

#[test]
fn test_partitioned_network_keeps_infinity() {
    let mut topology = Topology::new(4);
    topology.set_bidirectional_link(0, 1, 2).unwrap();
    topology.set_bidirectional_link(2, 3, 5).unwrap();

    let sim = converge(topology);
    sim.verify().unwrap();
    assert_eq!(sim.best_costs()[0], vec![0, 2, INFINITY, INFINITY]);
    assert_eq!(sim.node(0).unwrap().next_hop(3), None);
}

#[test]
fn test_no_further_updates_after_convergence() {
    let mut sim = converge(mesh(5));
    let settled = sim.best_costs();

    // Replaying every node's final vector to its neighbors changes nothing.
    let replay: Vec<(NodeId, RoutingVector)> = sim
        .nodes()
        .iter()
        .flat_map(|node| {
            let vector = node.distance_vector();
            node.neighbors().into_iter().map(move |n| (n, vector.clone()))
        })
        .collect();
    for (to, vector) in replay {
        sim.inject(to, vector);
    }

    let report = sim.run_until_quiescent(1_000).unwrap();
    assert_eq!(report.announcements, 0);
    assert_eq!(sim.best_costs(), settled);
}

/// Delivers over independent per-link FIFO queues, picking the next link in
/// a scrambled order, and checks the table bounds after every delivery.
#[test]
fn test_convergence_with_interleaved_links() {
    let topology = mesh(6);
    let expected = all_pairs_costs(&topology);
    let mut nodes: Vec<RoutingNode> = (0..topology.node_count())
        .map(|id| RoutingNode::from_topology(id, &topology, LinkChangePolicy::Ignore).unwrap())
        .collect();
    let mut links: BTreeMap<(NodeId, NodeId), VecDeque<RoutingVector>> = BTreeMap::new();

    let enqueue = |from: NodeId, transport: &mut RecordingTransport, links: &mut BTreeMap<_, VecDeque<_>>| {
        for (to, vector) in transport.drain() {
            links.entry((from, to)).or_default().push_back(vector);
        }
    };

    for node in &mut nodes {
        let mut transport = RecordingTransport::new();
        node.init(&mut transport);
        enqueue(node.id(), &mut transport, &mut links);
    }

    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut deliveries = 0;
    loop {
        let busy: Vec<(NodeId, NodeId)> = links
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(&key, _)| key)
            .collect();
        if busy.is_empty() {
            break;
        }
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        let (from, to) = busy[(seed % busy.len() as u64) as usize];
        let vector = links.get_mut(&(from, to)).unwrap().pop_front().unwrap();

        let mut transport = RecordingTransport::new();
        nodes[to].on_vector_received(&vector, &mut transport);
        enqueue(to, &mut transport, &mut links);
        deliveries += 1;
        assert!(deliveries < 100_000);

        let table = nodes[to].table();
        assert_eq!(table.cost(to, to), 0);
        assert!(table.rows().iter().flatten().all(|&c| c <= INFINITY));
    }

    for node in &nodes {
        assert_eq!(node.table().self_row(), expected[node.id()].as_slice());
    }
}

#[test]
fn test_link_improvement_reconverges() {
    let mut sim = Simulation::new(Topology::reference(), LinkChangePolicy::Reconverge);
    sim.start();
    sim.run_until_quiescent(1_000).unwrap();

    sim.change_link(1, 3, 1, true).unwrap();
    let report = sim.run_until_quiescent(1_000).unwrap();

    assert!(report.announcements > 0);
    sim.verify().unwrap();
    assert_eq!(sim.best_costs()[0][3], 2);
    assert_eq!(sim.node(0).unwrap().next_hop(3), Some(1));
}

#[test]
fn test_ignored_link_change_leaves_tables_stale() {
    let mut sim = Simulation::new(Topology::reference(), LinkChangePolicy::Ignore);
    sim.start();
    sim.run_until_quiescent(1_000).unwrap();
    let before = sim.best_costs();

    sim.change_link(1, 3, 1, true).unwrap();
    assert_eq!(sim.pending(), 0);
    assert_eq!(sim.best_costs(), before);
    assert!(matches!(sim.verify(), Err(SimulationError::Mismatch { .. })));
}

/// Cost increases are not propagated: the best-cost row only ever shrinks
/// when vectors arrive, so stale routes survive a link failure.
#[test]
fn test_link_failure_leaves_stale_routes() {
    let mut topology = Topology::new(3);
    topology.set_bidirectional_link(0, 1, 1).unwrap();
    topology.set_bidirectional_link(1, 2, 1).unwrap();

    let mut sim = Simulation::new(topology, LinkChangePolicy::Reconverge);
    sim.start();
    sim.run_until_quiescent(1_000).unwrap();
    assert_eq!(sim.best_costs()[0], vec![0, 1, 2]);

    sim.change_link(1, 2, INFINITY, true).unwrap();
    sim.run_until_quiescent(1_000).unwrap();

    // Node 1 now believes in the stale route back through node 0.
    assert_eq!(sim.best_costs()[1][2], 3);
    assert_eq!(sim.node(1).unwrap().next_hop(2), Some(0));
    assert_eq!(sim.best_costs()[0][2], 2);
    assert!(sim.verify().is_err());
}
