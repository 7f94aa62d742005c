use std::fs;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::network::{Topology, TopologyError};
use crate::protocol::LinkChangePolicy;
use crate::{Cost, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub node_count: usize,
    pub links: Vec<LinkConfig>,
    /// Applied one at a time, each after the network has gone quiet.
    #[serde(default)]
    pub link_changes: Vec<LinkConfig>,
    #[serde(default)]
    pub link_change_policy: LinkChangePolicy,
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub a: NodeId,
    pub b: NodeId,
    pub cost: Cost,
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

fn default_max_deliveries() -> usize {
    100_000
}

fn default_bidirectional() -> bool {
    true
}

impl LinkConfig {
    pub fn new(a: NodeId, b: NodeId, cost: Cost) -> Self {
        Self {
            a,
            b,
            cost,
            bidirectional: true,
        }
    }

    /// Parses `a:b:cost`, the command-line form of a bidirectional link.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        let [a, b, cost] = parts.as_slice() else {
            anyhow::bail!("expected a:b:cost, got {:?}", spec);
        };
        Ok(Self::new(a.trim().parse()?, b.trim().parse()?, cost.trim().parse()?))
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            node_count: 4,
            links: vec![
                LinkConfig::new(0, 1, 1),
                LinkConfig::new(0, 2, 3),
                LinkConfig::new(0, 3, 7),
                LinkConfig::new(1, 2, 1),
                LinkConfig::new(2, 3, 2),
            ],
            link_changes: vec![],
            link_change_policy: LinkChangePolicy::Ignore,
            max_deliveries: default_max_deliveries(),
        }
    }
}

impl SimulationConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Builds and validates the initial topology.
    pub fn to_topology(&self) -> Result<Topology, TopologyError> {
        if self.node_count == 0 {
            return Err(TopologyError::Empty);
        }

        let mut topology = Topology::new(self.node_count);
        for link in &self.links {
            if link.bidirectional {
                topology.set_bidirectional_link(link.a, link.b, link.cost)?;
            } else {
                topology.set_link(link.a, link.b, link.cost)?;
            }
        }
        topology.validate()?;
        Ok(topology)
    }
}
