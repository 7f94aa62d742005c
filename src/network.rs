pub mod delivery;
pub mod topology;

pub use delivery::{RecordingTransport, Transport};
pub use topology::{Topology, TopologyError};
