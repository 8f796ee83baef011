//! Link address configuration.
//!
//! Applies one [`SubnetAssignment`] to the two endpoints of a link by running
//! an address command in each endpoint's namespace. Only the interface's
//! address, netmask and broadcast are touched. Failures are reported, never
//! retried.

use std::net::Ipv4Addr;

use super::allocator::SubnetAssignment;
use crate::config::AddressCommand;
use crate::env::{Environment, EnvironmentError, LinkHandle, NodeHandle};
use crate::topology::{EndpointSide, LinkId};

/// Why an endpoint could not be configured
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationFailure {
    #[error("command '{command}' exited with status {status}: {output}")]
    Rejected { command: String, status: i32, output: String },

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// A single endpoint's address command failed
#[derive(Debug, thiserror::Error)]
#[error("failed to configure {link} ({side} endpoint {node}:{interface}): {failure}")]
pub struct ConfigurationError {
    pub link: LinkId,
    pub side: EndpointSide,
    pub node: String,
    pub interface: String,
    #[source]
    pub failure: ConfigurationFailure,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkConfigurator {
    command: AddressCommand,
}

impl LinkConfigurator {
    pub fn new(command: AddressCommand) -> Self {
        Self { command }
    }

    /// Command line setting `host` on `iface` within the assignment's subnet
    pub fn command_line(&self, iface: &str, host: Ipv4Addr, assignment: &SubnetAssignment) -> String {
        match self.command {
            AddressCommand::Ip => format!(
                "ip addr replace {}/{} broadcast {} dev {}",
                host, assignment.prefix_len, assignment.broadcast, iface
            ),
            AddressCommand::Ifconfig => format!(
                "ifconfig {} {} netmask {} broadcast {}",
                iface, host, assignment.netmask, assignment.broadcast
            ),
        }
    }

    /// Configure both endpoints of `link`, first-declared first.
    ///
    /// Stops at the first failing endpoint; if the second endpoint fails the
    /// first one keeps its new address.
    pub fn apply(
        &self,
        env: &mut dyn Environment,
        link: &LinkHandle,
        assignment: &SubnetAssignment,
    ) -> Result<(), ConfigurationError> {
        for side in [EndpointSide::First, EndpointSide::Second] {
            let (node, iface) = &link.endpoints[side.index()];
            self.apply_endpoint(env, node, iface, side, assignment)?;
        }
        log::info!("Configured {} on {}", assignment.cidr(), link);
        Ok(())
    }

    fn apply_endpoint(
        &self,
        env: &mut dyn Environment,
        node: &NodeHandle,
        iface: &str,
        side: EndpointSide,
        assignment: &SubnetAssignment,
    ) -> Result<(), ConfigurationError> {
        let host = assignment.host(side);
        let command = self.command_line(iface, host, assignment);
        log::debug!("{}: {}", node, command);

        let fail = |failure: ConfigurationFailure| ConfigurationError {
            link: assignment.link,
            side,
            node: node.name.clone(),
            interface: iface.to_string(),
            failure,
        };

        let output = env.run_command(node, &command).map_err(|e| fail(e.into()))?;
        if !output.success() {
            return Err(fail(ConfigurationFailure::Rejected {
                command,
                status: output.status,
                output: output.output.trim().to_string(),
            }));
        }
        Ok(())
    }
}
