//! Per-link subnet allocation.
//!
//! Link `i` (by creation ordinal) gets `BASE.i.0/24`. The first-declared
//! endpoint is `.1`, the second `.2`, broadcast is `.255`. Nothing else is
//! considered: no variable-length subnetting and no checks against networks
//! outside the emulation.

use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::topology::{EndpointSide, Link, LinkId, Topology};
use crate::utils::ip_utils::{broadcast_address, netmask_from_prefix_len, BasePrefix};

/// Prefix length of every link subnet
pub const LINK_PREFIX_LEN: u8 = 24;

/// Number of distinct third-octet values, i.e. the most links one prefix can address
pub const MAX_LINKS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("address space {prefix}.0.0/16 exhausted: {link} exceeds the {max} available /24 blocks")]
    AddressSpaceExhausted { prefix: BasePrefix, link: LinkId, max: usize },
}

/// Address block and host addresses computed for one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetAssignment {
    pub link: LinkId,
    pub network: Ipv4Addr,
    pub prefix_len: u8,
    pub netmask: Ipv4Addr,
    pub broadcast: Ipv4Addr,
    /// Host address per endpoint, indexed like `Link::endpoints`
    pub hosts: [Ipv4Addr; 2],
}

impl SubnetAssignment {
    pub fn host(&self, side: EndpointSide) -> Ipv4Addr {
        self.hosts[side.index()]
    }

    /// `10.0.3.0/24`
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.network, self.prefix_len)
    }
}

impl fmt::Display for SubnetAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({} / {})", self.link, self.cidr(), self.hosts[0], self.hosts[1])
    }
}

/// Deterministic ordinal-based allocator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubnetAllocator {
    prefix: BasePrefix,
}

impl SubnetAllocator {
    pub fn new(prefix: BasePrefix) -> Self {
        Self { prefix }
    }

    pub fn prefix(&self) -> BasePrefix {
        self.prefix
    }

    /// Block for the link created at `ordinal`
    pub fn assign(&self, ordinal: LinkId) -> Result<SubnetAssignment, AllocationError> {
        let third = u8::try_from(ordinal.0).map_err(|_| AllocationError::AddressSpaceExhausted {
            prefix: self.prefix,
            link: ordinal,
            max: MAX_LINKS,
        })?;

        let network = self.prefix.addr(third, 0);
        Ok(SubnetAssignment {
            link: ordinal,
            network,
            prefix_len: LINK_PREFIX_LEN,
            netmask: netmask_from_prefix_len(LINK_PREFIX_LEN),
            broadcast: broadcast_address(network, LINK_PREFIX_LEN),
            hosts: [self.prefix.addr(third, 1), self.prefix.addr(third, 2)],
        })
    }

    /// Block for a link, keyed by the ordinal stored on it
    pub fn assign_link(&self, link: &Link) -> Result<SubnetAssignment, AllocationError> {
        self.assign(link.ordinal)
    }

    /// Assignments for every link of a topology, in creation order
    pub fn plan(&self, topology: &Topology) -> Result<Vec<SubnetAssignment>, AllocationError> {
        topology.links().iter().map(|link| self.assign_link(link)).collect()
    }
}
