//! Virtualization environment interface.
//!
//! The addressing core only ever talks to an [`Environment`]: it creates
//! nodes and named links, starts and stops the emulation, and runs shell
//! commands inside a node's network namespace.

pub mod command;
pub mod memory;
pub mod netns;

use std::fmt;
use std::io;

pub use command::CommandOutput;
pub use memory::MemoryEnvironment;
pub use netns::NetnsEnvironment;

/// Errors reported by an environment implementation
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("'{command}' exited with status {status}: {output}")]
    CommandFailed { command: String, status: i32, output: String },

    #[error("node '{0}' does not exist in the environment")]
    UnknownNode(String),

    #[error("node '{0}' already exists in the environment")]
    NodeExists(String),

    #[error("environment is not running")]
    NotRunning,

    #[error("environment start failed: {0}")]
    StartFailed(String),

    #[error("environment reports {found} links but {expected} were created")]
    LinkCountMismatch { expected: usize, found: usize },

    #[error("environment link #{ordinal} is {found}, expected {expected}")]
    LinkOrderMismatch { ordinal: usize, expected: String, found: String },
}

/// Opaque reference to a node created in an environment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    pub name: String,
}

impl NodeHandle {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A created link: both endpoint nodes with their interface names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHandle {
    pub endpoints: [(NodeHandle, String); 2],
}

impl LinkHandle {
    pub fn new(node_a: &NodeHandle, iface_a: &str, node_b: &NodeHandle, iface_b: &str) -> Self {
        Self {
            endpoints: [
                (node_a.clone(), iface_a.to_string()),
                (node_b.clone(), iface_b.to_string()),
            ],
        }
    }
}

impl fmt::Display for LinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [(a, ia), (b, ib)] = &self.endpoints;
        write!(f, "{}:{} <-> {}:{}", a, ia, b, ib)
    }
}

/// The virtualization collaborator
pub trait Environment {
    /// Short name used in logs
    fn kind(&self) -> &'static str;

    fn create_node(&mut self, name: &str) -> Result<NodeHandle, EnvironmentError>;

    fn create_link(
        &mut self,
        node_a: &NodeHandle,
        iface_a: &str,
        node_b: &NodeHandle,
        iface_b: &str,
    ) -> Result<LinkHandle, EnvironmentError>;

    fn start(&mut self) -> Result<(), EnvironmentError>;

    /// Stop the environment. Stopping an environment that is not running is a no-op.
    fn stop(&mut self) -> Result<(), EnvironmentError>;

    fn is_running(&self) -> bool;

    /// Run a shell command line inside the node's network namespace
    fn run_command(&mut self, node: &NodeHandle, command_line: &str) -> Result<CommandOutput, EnvironmentError>;

    /// Created links, in creation order
    fn list_links(&self) -> Vec<LinkHandle>;
}
