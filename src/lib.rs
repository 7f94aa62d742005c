pub mod algorithms;
pub mod config;
pub mod network;
pub mod protocol;
pub mod report;
pub mod router;
pub mod simulation;

/// Index of a node, stable for the whole run. Valid ids are `0..node_count`.
pub type NodeId = usize;

/// Link or path cost. `INFINITY` marks an unreachable destination.
pub type Cost = u32;

/// Sentinel cost meaning "no route". Must stay larger than any real path sum.
pub const INFINITY: Cost = 999;

/// Adds two costs, saturating at `INFINITY`.
pub fn add_costs(a: Cost, b: Cost) -> Cost {
    a.saturating_add(b).min(INFINITY)
}

pub use config::SimulationConfig;
pub use network::{RecordingTransport, Topology, TopologyError, Transport};
pub use protocol::{DistanceTable, LinkChangePolicy, RoutingNode, RoutingVector, UpdateOutcome};
pub use report::TableSnapshot;
pub use router::RouterNetwork;
pub use simulation::{ConvergenceReport, Simulation, SimulationError};
