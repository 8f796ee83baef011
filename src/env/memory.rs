//! In-process environment.
//!
//! Keeps nodes, links and interface addresses in memory and interprets the
//! address commands the configurator issues. Used for `--dry-run` and by the
//! test suite, which can also inject command failures.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::{CommandOutput, Environment, EnvironmentError, LinkHandle, NodeHandle};
use crate::utils::ip_utils::{broadcast_address, netmask_from_prefix_len};

/// Address/netmask/broadcast triple held by an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub broadcast: Ipv4Addr,
}

#[derive(Debug, Clone)]
struct FailureRule {
    node: String,
    needle: String,
}

#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    nodes: Vec<String>,
    interfaces: BTreeMap<(String, String), Option<InterfaceAddress>>,
    links: Vec<LinkHandle>,
    running: bool,
    starts: usize,
    stops: usize,
    history: Vec<(String, String)>,
    failures: Vec<FailureRule>,
    fail_start: bool,
    echo: bool,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every command at info level, for dry runs
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Make every command on `node` whose text contains `needle` exit with status 1
    pub fn fail_commands_matching(&mut self, node: &str, needle: &str) {
        self.failures.push(FailureRule { node: node.to_string(), needle: needle.to_string() });
    }

    /// Make the next `start()` fail
    pub fn fail_next_start(&mut self) {
        self.fail_start = true;
    }

    pub fn interface_address(&self, node: &str, iface: &str) -> Option<InterfaceAddress> {
        self.interfaces
            .get(&(node.to_string(), iface.to_string()))
            .copied()
            .flatten()
    }

    pub fn has_interface(&self, node: &str, iface: &str) -> bool {
        self.interfaces.contains_key(&(node.to_string(), iface.to_string()))
    }

    /// `(node, command line)` for every command run so far
    pub fn history(&self) -> &[(String, String)] {
        &self.history
    }

    pub fn node_names(&self) -> &[String] {
        &self.nodes
    }

    /// Number of successful starts
    pub fn start_count(&self) -> usize {
        self.starts
    }

    /// Number of stops that actually brought a running environment down
    pub fn stop_count(&self) -> usize {
        self.stops
    }

    fn ensure_node(&self, node: &NodeHandle) -> Result<(), EnvironmentError> {
        if self.nodes.iter().any(|n| *n == node.name) {
            Ok(())
        } else {
            Err(EnvironmentError::UnknownNode(node.name.clone()))
        }
    }

    fn set_address(&mut self, node: &str, iface: &str, addr: InterfaceAddress) -> CommandOutput {
        match self.interfaces.get_mut(&(node.to_string(), iface.to_string())) {
            Some(slot) => {
                *slot = Some(addr);
                CommandOutput::ok("")
            }
            None => CommandOutput::failed(1, format!("Cannot find device \"{}\"", iface)),
        }
    }

    fn show_addresses(&self, node: &str) -> CommandOutput {
        let mut out = String::new();
        for ((owner, iface), addr) in &self.interfaces {
            if owner != node {
                continue;
            }
            match addr {
                Some(a) => out.push_str(&format!(
                    "{}: inet {} netmask {} broadcast {}\n",
                    iface, a.address, a.netmask, a.broadcast
                )),
                None => out.push_str(&format!("{}: <no address>\n", iface)),
            }
        }
        CommandOutput::ok(out)
    }

    /// Interpret the handful of commands this crate issues; anything else succeeds silently
    fn interpret(&mut self, node: &str, command_line: &str) -> CommandOutput {
        let tokens: Vec<&str> = command_line.split_whitespace().collect();
        match tokens.as_slice() {
            ["ip", "addr" | "address" | "a"] | ["ip", "addr" | "address", "show"] | ["ifconfig"] => {
                self.show_addresses(node)
            }
            ["ip", "addr" | "address", "replace" | "add", rest @ ..] => match parse_ip_addr(rest) {
                Some((iface, addr)) => self.set_address(node, iface, addr),
                None => CommandOutput::failed(1, format!("unsupported command: {}", command_line)),
            },
            ["ifconfig", iface, addr, rest @ ..] => match parse_ifconfig(addr, rest) {
                Some(addr) => self.set_address(node, iface, addr),
                None => CommandOutput::failed(1, format!("unsupported command: {}", command_line)),
            },
            _ => CommandOutput::ok(""),
        }
    }
}

fn value_after<'a>(tokens: &[&'a str], key: &str) -> Option<&'a str> {
    tokens.iter().position(|t| *t == key).and_then(|i| tokens.get(i + 1)).copied()
}

/// `A/len broadcast B dev IF`
fn parse_ip_addr<'a>(tokens: &[&'a str]) -> Option<(&'a str, InterfaceAddress)> {
    let (addr, len) = tokens.first()?.split_once('/')?;
    let address: Ipv4Addr = addr.parse().ok()?;
    let prefix_len = len.parse::<u8>().ok().filter(|l| *l <= 32)?;
    let broadcast = match value_after(tokens, "broadcast") {
        Some(b) => b.parse().ok()?,
        None => broadcast_address(address, prefix_len),
    };
    let iface = value_after(tokens, "dev")?;
    Some((iface, InterfaceAddress { address, netmask: netmask_from_prefix_len(prefix_len), broadcast }))
}

/// `A netmask M broadcast B`
fn parse_ifconfig(addr: &str, rest: &[&str]) -> Option<InterfaceAddress> {
    Some(InterfaceAddress {
        address: addr.parse().ok()?,
        netmask: value_after(rest, "netmask")?.parse().ok()?,
        broadcast: value_after(rest, "broadcast")?.parse().ok()?,
    })
}

impl Environment for MemoryEnvironment {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn create_node(&mut self, name: &str) -> Result<NodeHandle, EnvironmentError> {
        if self.nodes.iter().any(|n| n == name) {
            return Err(EnvironmentError::NodeExists(name.to_string()));
        }
        self.nodes.push(name.to_string());
        Ok(NodeHandle::new(name))
    }

    fn create_link(
        &mut self,
        node_a: &NodeHandle,
        iface_a: &str,
        node_b: &NodeHandle,
        iface_b: &str,
    ) -> Result<LinkHandle, EnvironmentError> {
        self.ensure_node(node_a)?;
        self.ensure_node(node_b)?;
        for (node, iface) in [(node_a, iface_a), (node_b, iface_b)] {
            if self.has_interface(&node.name, iface) {
                return Err(EnvironmentError::CommandFailed {
                    command: format!("create link {}:{}", node, iface),
                    status: 2,
                    output: "File exists".to_string(),
                });
            }
        }
        self.interfaces.insert((node_a.name.clone(), iface_a.to_string()), None);
        self.interfaces.insert((node_b.name.clone(), iface_b.to_string()), None);

        let handle = LinkHandle::new(node_a, iface_a, node_b, iface_b);
        self.links.push(handle.clone());
        Ok(handle)
    }

    fn start(&mut self) -> Result<(), EnvironmentError> {
        if self.fail_start {
            self.fail_start = false;
            return Err(EnvironmentError::StartFailed("injected start failure".to_string()));
        }
        if !self.running {
            self.running = true;
            self.starts += 1;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EnvironmentError> {
        if self.running {
            self.running = false;
            self.stops += 1;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn run_command(&mut self, node: &NodeHandle, command_line: &str) -> Result<CommandOutput, EnvironmentError> {
        if !self.running {
            return Err(EnvironmentError::NotRunning);
        }
        self.ensure_node(node)?;
        self.history.push((node.name.clone(), command_line.to_string()));
        if self.echo {
            log::info!("[dry-run] {}: {}", node, command_line);
        }

        let injected = self
            .failures
            .iter()
            .any(|rule| rule.node == node.name && command_line.contains(&rule.needle));
        if injected {
            return Ok(CommandOutput::failed(1, "injected failure"));
        }

        Ok(self.interpret(&node.name, command_line))
    }

    fn list_links(&self) -> Vec<LinkHandle> {
        self.links.clone()
    }
}
