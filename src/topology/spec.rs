//! Declarative topology specifications.
//!
//! A [`TopologySpec`] says *what* to build: node names and links with their
//! interface-name pairs, in order. The builder decides *how*.

use serde::{Deserialize, Serialize};

use super::types::{Topology, TopologyError};

/// One link declaration: `(node, interface)` on each side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub node_a: String,
    pub iface_a: String,
    pub node_b: String,
    pub iface_b: String,
}

impl LinkSpec {
    pub fn new(node_a: &str, iface_a: &str, node_b: &str, iface_b: &str) -> Self {
        Self {
            node_a: node_a.to_string(),
            iface_a: iface_a.to_string(),
            node_b: node_b.to_string(),
            iface_b: iface_b.to_string(),
        }
    }
}

/// Ordered node and link declarations for one topology
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpec {
    pub nodes: Vec<String>,
    pub links: Vec<LinkSpec>,
}

impl TopologySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style node declaration
    pub fn node(mut self, name: &str) -> Self {
        self.nodes.push(name.to_string());
        self
    }

    /// Builder-style link declaration; link order is declaration order
    pub fn link(mut self, node_a: &str, iface_a: &str, node_b: &str, iface_b: &str) -> Self {
        self.links.push(LinkSpec::new(node_a, iface_a, node_b, iface_b));
        self
    }

    /// Construct the in-memory graph. Any error discards the whole graph.
    pub fn to_topology(&self) -> Result<Topology, TopologyError> {
        let mut topology = Topology::new();
        for name in &self.nodes {
            topology.add_node(name)?;
        }
        for link in &self.links {
            topology.add_link_by_name(&link.node_a, &link.iface_a, &link.node_b, &link.iface_b)?;
        }
        Ok(topology)
    }

    /// Seven routers and nine links used for the distance-vector routing lab.
    ///
    /// ```text
    ///     r1----------r2-----------r3----------r4
    ///     |          /             |           |
    ///     |        /               |           |
    ///     |      /                 |           |
    ///     |    /                   |           |
    ///     |  /                     |           |
    ///     r0 --------------------- r6----------r5
    /// ```
    pub fn dv_routing_example() -> Self {
        (0..7)
            .fold(Self::new(), |spec, i| spec.node(&format!("r{}", i)))
            .link("r0", "eth0", "r1", "eth1")
            .link("r0", "eth1", "r2", "eth1")
            .link("r1", "eth0", "r2", "eth2")
            .link("r2", "eth0", "r3", "eth0")
            .link("r3", "eth1", "r4", "eth0")
            .link("r4", "eth1", "r5", "eth0")
            .link("r5", "eth1", "r6", "eth0")
            .link("r6", "eth1", "r3", "eth2")
            .link("r0", "eth2", "r6", "eth2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dv_example_shape() {
        let spec = TopologySpec::dv_routing_example();
        assert_eq!(spec.nodes, vec!["r0", "r1", "r2", "r3", "r4", "r5", "r6"]);
        assert_eq!(spec.links.len(), 9);

        let topo = spec.to_topology().unwrap();
        assert_eq!(topo.nodes().len(), 7);
        assert_eq!(topo.links().len(), 9);

        // r2 and r3 terminate three links each
        assert_eq!(topo.node_by_name("r2").unwrap().interfaces.len(), 3);
        assert_eq!(topo.node_by_name("r3").unwrap().interfaces.len(), 3);
        assert_eq!(topo.describe_link(&topo.links()[8]), "r0:eth2 <-> r6:eth2");
    }

    #[test]
    fn test_spec_error_aborts_build() {
        let spec = TopologySpec::new()
            .node("a")
            .node("b")
            .link("a", "eth0", "b", "eth0")
            .link("a", "eth0", "b", "eth1");
        let err = spec.to_topology().unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateInterfaceName { .. }));
    }

    #[test]
    fn test_spec_duplicate_node() {
        let spec = TopologySpec::new().node("a").node("a");
        assert!(matches!(spec.to_topology(), Err(TopologyError::DuplicateNode { .. })));
    }
}
