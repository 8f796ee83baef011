//! Topology graph types.
//!
//! This file contains the in-memory graph of nodes, interfaces and
//! point-to-point links. Links remember the ordinal they were created at,
//! and that ordinal is what drives subnet numbering later on.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::utils::validation::{validate_interface_name, validate_node_name};

/// Errors raised while declaring nodes and links
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("node '{name}' already exists")]
    DuplicateNode { name: String },

    #[error("interface '{interface}' is already bound on node '{node}'")]
    DuplicateInterfaceName { node: String, interface: String },

    #[error("self-link on node '{node}' ({first} <-> {second}) is not allowed")]
    SelfLink { node: String, first: String, second: String },

    #[error("unknown node '{name}'")]
    UnknownNode { name: String },

    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName { kind: &'static str, name: String, reason: String },
}

/// Index of a node inside its [`Topology`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

/// Creation ordinal of a link inside its [`Topology`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkId(pub usize);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// A node-local network attachment point, owned by exactly one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub name: String,
    pub link: LinkId,
}

/// An emulated host or router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub interfaces: Vec<Interface>,
}

impl Node {
    /// Returns true if an interface with this name is already bound on the node
    pub fn has_interface(&self, name: &str) -> bool {
        self.interfaces.iter().any(|iface| iface.name == name)
    }
}

/// Which side of a link an endpoint was declared on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EndpointSide {
    First,
    Second,
}

impl EndpointSide {
    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

impl fmt::Display for EndpointSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Second => write!(f, "second"),
        }
    }
}

/// One end of a link: a node and the interface name bound on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub node: NodeId,
    pub interface: String,
}

/// A point-to-point link between two interfaces on two nodes.
///
/// `ordinal` is fixed when the link is created and never recomputed, so
/// filtering or reordering a link list cannot shift anyone's addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub ordinal: LinkId,
    pub endpoints: [Endpoint; 2],
}

impl Link {
    pub fn endpoint(&self, side: EndpointSide) -> &Endpoint {
        &self.endpoints[side.index()]
    }

    pub fn first(&self) -> &Endpoint {
        &self.endpoints[0]
    }

    pub fn second(&self) -> &Endpoint {
        &self.endpoints[1]
    }
}

/// The complete set of nodes and links for one emulation session
#[derive(Debug, Clone, Default, Serialize)]
pub struct Topology {
    nodes: Vec<Node>,
    links: Vec<Link>,
    #[serde(skip)]
    by_name: HashMap<String, NodeId>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. Fails without modifying the topology if the name is taken.
    pub fn add_node(&mut self, name: &str) -> Result<NodeId, TopologyError> {
        validate_node_name(name)?;
        if self.by_name.contains_key(name) {
            return Err(TopologyError::DuplicateNode { name: name.to_string() });
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { id, name: name.to_string(), interfaces: Vec::new() });
        self.by_name.insert(name.to_string(), id);
        log::debug!("Added node {} as {:?}", name, id);
        Ok(id)
    }

    /// Add a link between two nodes, binding one new interface on each.
    ///
    /// All checks run before anything is mutated, so a failed call never
    /// leaves half a link behind.
    pub fn add_link(
        &mut self,
        node_a: NodeId,
        iface_a: &str,
        node_b: NodeId,
        iface_b: &str,
    ) -> Result<LinkId, TopologyError> {
        validate_interface_name(iface_a)?;
        validate_interface_name(iface_b)?;

        let a = self.node_checked(node_a)?;
        let b = self.node_checked(node_b)?;

        if a.id == b.id {
            return Err(TopologyError::SelfLink {
                node: a.name.clone(),
                first: iface_a.to_string(),
                second: iface_b.to_string(),
            });
        }
        for (node, iface) in [(a, iface_a), (b, iface_b)] {
            if node.has_interface(iface) {
                return Err(TopologyError::DuplicateInterfaceName {
                    node: node.name.clone(),
                    interface: iface.to_string(),
                });
            }
        }

        let ordinal = LinkId(self.links.len());
        self.nodes[node_a.0].interfaces.push(Interface { name: iface_a.to_string(), link: ordinal });
        self.nodes[node_b.0].interfaces.push(Interface { name: iface_b.to_string(), link: ordinal });
        self.links.push(Link {
            ordinal,
            endpoints: [
                Endpoint { node: node_a, interface: iface_a.to_string() },
                Endpoint { node: node_b, interface: iface_b.to_string() },
            ],
        });

        log::debug!(
            "Added {}: {}:{} <-> {}:{}",
            ordinal,
            self.nodes[node_a.0].name,
            iface_a,
            self.nodes[node_b.0].name,
            iface_b
        );
        Ok(ordinal)
    }

    /// Same as [`Topology::add_link`] but addressing nodes by name
    pub fn add_link_by_name(
        &mut self,
        node_a: &str,
        iface_a: &str,
        node_b: &str,
        iface_b: &str,
    ) -> Result<LinkId, TopologyError> {
        let a = self.node_id(node_a).ok_or_else(|| TopologyError::UnknownNode { name: node_a.to_string() })?;
        let b = self.node_id(node_b).ok_or_else(|| TopologyError::UnknownNode { name: node_b.to_string() })?;
        self.add_link(a, iface_a, b, iface_b)
    }

    fn node_checked(&self, id: NodeId) -> Result<&Node, TopologyError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| TopologyError::UnknownNode { name: format!("#{}", id.0) })
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.node_id(name).and_then(|id| self.node(id))
    }

    /// Name of a node; node ids handed out by this topology are always valid
    pub fn node_name(&self, id: NodeId) -> &str {
        self.nodes.get(id.0).map(|n| n.name.as_str()).unwrap_or("<unknown>")
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Links in creation order
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    /// Human-readable `r0:eth0 <-> r1:eth1` form of a link
    pub fn describe_link(&self, link: &Link) -> String {
        format!(
            "{}:{} <-> {}:{}",
            self.node_name(link.first().node),
            link.first().interface,
            self.node_name(link.second().node),
            link.second().interface
        )
    }
}
