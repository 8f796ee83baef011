//! Network topology module.
//!
//! This module contains the topology graph, declarative topology
//! specifications and the builder that realizes and addresses them.

pub mod builder;
pub mod spec;
pub mod types;

// Re-export key types for easier access
pub use builder::{AddressingError, AddressingReport, BuildError, RealizedTopology, TopologyBuilder};
pub use spec::{LinkSpec, TopologySpec};
pub use types::{Endpoint, EndpointSide, Interface, Link, LinkId, Node, NodeId, Topology, TopologyError};
