//! Topology realization and addressing.
//!
//! The builder turns a [`TopologySpec`] into nodes and links inside an
//! [`Environment`], then walks the links by ordinal, allocating a subnet for
//! each and configuring both ends.

use serde::Serialize;

use super::spec::TopologySpec;
use super::types::{LinkId, NodeId, Topology, TopologyError};
use crate::config::Config;
use crate::env::{Environment, EnvironmentError, LinkHandle, NodeHandle};
use crate::ip::{AllocationError, ConfigurationError, LinkConfigurator, SubnetAllocator, SubnetAssignment};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("environment error while building topology: {0}")]
    Environment(#[from] EnvironmentError),
}

/// Why addressing stopped early
#[derive(Debug, thiserror::Error)]
pub enum AddressingError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl AddressingError {
    /// The link addressing stopped at
    pub fn link(&self) -> LinkId {
        match self {
            Self::Allocation(AllocationError::AddressSpaceExhausted { link, .. }) => *link,
            Self::Configuration(e) => e.link,
        }
    }
}

/// A topology together with the environment handles realizing it.
///
/// `links()[i]` is the handle of the topology link with ordinal `i`.
#[derive(Debug, Clone)]
pub struct RealizedTopology {
    topology: Topology,
    nodes: Vec<NodeHandle>,
    links: Vec<LinkHandle>,
}

impl RealizedTopology {
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn node_handle(&self, id: NodeId) -> Option<&NodeHandle> {
        self.nodes.get(id.0)
    }

    /// Handle for a node by name
    pub fn find_node(&self, name: &str) -> Option<&NodeHandle> {
        self.topology.node_id(name).and_then(|id| self.node_handle(id))
    }

    pub fn link_handle(&self, id: LinkId) -> Option<&LinkHandle> {
        self.links.get(id.0)
    }

    pub fn links(&self) -> &[LinkHandle] {
        &self.links
    }
}

/// Outcome of [`TopologyBuilder::address_all`]
#[derive(Debug, Default, Serialize)]
pub struct AddressingReport {
    /// Links configured successfully, in ordinal order
    pub addressed: Vec<SubnetAssignment>,
    /// Links left untouched (including the failing one, if any)
    pub unaddressed: Vec<LinkId>,
    #[serde(skip)]
    pub failure: Option<AddressingError>,
}

impl AddressingReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failed_link(&self) -> Option<LinkId> {
        self.failure.as_ref().map(AddressingError::link)
    }

    pub fn assignment(&self, link: LinkId) -> Option<&SubnetAssignment> {
        self.addressed.iter().find(|a| a.link == link)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyBuilder {
    allocator: SubnetAllocator,
    configurator: LinkConfigurator,
}

impl TopologyBuilder {
    pub fn new(allocator: SubnetAllocator, configurator: LinkConfigurator) -> Self {
        Self { allocator, configurator }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SubnetAllocator::new(config.addressing.base_prefix),
            LinkConfigurator::new(config.addressing.command),
        )
    }

    pub fn allocator(&self) -> &SubnetAllocator {
        &self.allocator
    }

    /// Realize `spec` in `env`, preserving link declaration order.
    ///
    /// The graph is validated in full before the environment is touched, so a
    /// topology error never leaves half a network behind.
    pub fn build(&self, spec: &TopologySpec, env: &mut dyn Environment) -> Result<RealizedTopology, BuildError> {
        let topology = spec.to_topology()?;
        log::info!(
            "Building topology with {} nodes and {} links in {} environment",
            topology.nodes().len(),
            topology.links().len(),
            env.kind()
        );

        let mut nodes = Vec::with_capacity(topology.nodes().len());
        for node in topology.nodes() {
            nodes.push(env.create_node(&node.name)?);
        }

        let mut links = Vec::with_capacity(topology.links().len());
        for link in topology.links() {
            let (a, b) = (link.first(), link.second());
            let handle = env.create_link(&nodes[a.node.0], &a.interface, &nodes[b.node.0], &b.interface)?;
            links.push(handle);
        }

        verify_link_order(&links, &env.list_links())?;
        Ok(RealizedTopology { topology, nodes, links })
    }

    /// Address every link in creation order, stopping at the first failure.
    ///
    /// Links addressed before the failure keep their addresses.
    pub fn address_all(&self, realized: &RealizedTopology, env: &mut dyn Environment) -> AddressingReport {
        let mut report = AddressingReport::default();
        let links = realized.topology.links();

        for (position, link) in links.iter().enumerate() {
            match self.address_link(realized, link.ordinal, env) {
                Ok(assignment) => report.addressed.push(assignment),
                Err(e) => {
                    log::error!("Addressing aborted at {}: {}", link.ordinal, e);
                    report.unaddressed = links[position..].iter().map(|l| l.ordinal).collect();
                    report.failure = Some(e);
                    return report;
                }
            }
        }

        log::info!("Addressed {} links", report.addressed.len());
        report
    }

    fn address_link(
        &self,
        realized: &RealizedTopology,
        ordinal: LinkId,
        env: &mut dyn Environment,
    ) -> Result<SubnetAssignment, AddressingError> {
        let assignment = self.allocator.assign(ordinal)?;
        // realized.links is built one-to-one with topology.links
        let handle = &realized.links[ordinal.0];
        self.configurator.apply(env, handle, &assignment)?;
        Ok(assignment)
    }
}

fn verify_link_order(created: &[LinkHandle], listed: &[LinkHandle]) -> Result<(), EnvironmentError> {
    if created.len() != listed.len() {
        return Err(EnvironmentError::LinkCountMismatch { expected: created.len(), found: listed.len() });
    }
    for (ordinal, (expected, found)) in created.iter().zip(listed).enumerate() {
        if expected != found {
            return Err(EnvironmentError::LinkOrderMismatch {
                ordinal,
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }
    Ok(())
}
