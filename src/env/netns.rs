//! Linux network namespace environment.
//!
//! Every node is a namespace created with `ip netns add`. Every link is a
//! veth pair created under temporary names in the root namespace, moved into
//! the two endpoint namespaces and renamed there to the declared interface
//! names. Stopping deletes the namespaces, which also destroys the veths.

use std::process::Command;

use super::command::{capture, run_checked};
use super::{CommandOutput, Environment, EnvironmentError, LinkHandle, NodeHandle};
use crate::config::EnvironmentConfig;

#[derive(Debug)]
pub struct NetnsEnvironment {
    config: EnvironmentConfig,
    nodes: Vec<NodeHandle>,
    links: Vec<LinkHandle>,
    running: bool,
    /// Keeps temporary veth names apart when several instances share a host
    instance_tag: u32,
}

impl NetnsEnvironment {
    pub fn new(config: EnvironmentConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            links: Vec::new(),
            running: false,
            instance_tag: std::process::id() % 100_000,
        }
    }

    /// Namespace name backing a node
    pub fn namespace(&self, node: &NodeHandle) -> String {
        format!("{}{}", self.config.namespace_prefix, node.name)
    }

    fn ip(&self) -> Command {
        if self.config.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(&self.config.ip_binary);
            cmd
        } else {
            Command::new(&self.config.ip_binary)
        }
    }

    fn ip_run(&self, args: &[&str]) -> Result<CommandOutput, EnvironmentError> {
        let mut cmd = self.ip();
        cmd.args(args);
        run_checked(cmd)
    }

    fn ensure_node(&self, node: &NodeHandle) -> Result<(), EnvironmentError> {
        if self.nodes.contains(node) {
            Ok(())
        } else {
            Err(EnvironmentError::UnknownNode(node.name.clone()))
        }
    }

    fn set_up(&self, node: &NodeHandle, iface: &str) -> Result<(), EnvironmentError> {
        let ns = self.namespace(node);
        self.ip_run(&["-n", ns.as_str(), "link", "set", iface, "up"])?;
        Ok(())
    }

    fn wire_veth(
        &self,
        tmp: [&str; 2],
        node_a: &NodeHandle,
        iface_a: &str,
        node_b: &NodeHandle,
        iface_b: &str,
    ) -> Result<(), EnvironmentError> {
        let ns_a = self.namespace(node_a);
        let ns_b = self.namespace(node_b);

        self.ip_run(&["link", "set", tmp[0], "netns", ns_a.as_str()])?;
        self.ip_run(&["link", "set", tmp[1], "netns", ns_b.as_str()])?;
        self.ip_run(&["-n", ns_a.as_str(), "link", "set", tmp[0], "name", iface_a])?;
        self.ip_run(&["-n", ns_b.as_str(), "link", "set", tmp[1], "name", iface_b])?;
        Ok(())
    }
}

impl Environment for NetnsEnvironment {
    fn kind(&self) -> &'static str {
        "netns"
    }

    fn create_node(&mut self, name: &str) -> Result<NodeHandle, EnvironmentError> {
        let node = NodeHandle::new(name);
        if self.nodes.contains(&node) {
            return Err(EnvironmentError::NodeExists(name.to_string()));
        }

        let ns = self.namespace(&node);
        self.ip_run(&["netns", "add", ns.as_str()])?;
        log::debug!("Created namespace {} for node {}", ns, name);
        // tracked before `lo` so stop() removes the namespace either way
        self.nodes.push(node.clone());
        if self.running {
            self.set_up(&node, "lo")?;
        }
        Ok(node)
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

        let ordinal = self.links.len();
        let tmp_a = format!("ln{}x{}a", self.instance_tag, ordinal);
        let tmp_b = format!("ln{}x{}b", self.instance_tag, ordinal);

        self.ip_run(&["link", "add", tmp_a.as_str(), "type", "veth", "peer", "name", tmp_b.as_str()])?;
        if let Err(e) = self.wire_veth([tmp_a.as_str(), tmp_b.as_str()], node_a, iface_a, node_b, iface_b) {
            // an end still in the root namespace would outlive the session
            if let Err(cleanup) = self.ip_run(&["link", "delete", tmp_a.as_str()]) {
                log::debug!("No leftover veth {} to remove: {}", tmp_a, cleanup);
            }
            return Err(e);
        }

        if self.running {
            self.set_up(node_a, iface_a)?;
            self.set_up(node_b, iface_b)?;
        }

        let handle = LinkHandle::new(node_a, iface_a, node_b, iface_b);
        log::debug!("Created veth link {}", handle);
        self.links.push(handle.clone());
        Ok(handle)
    }

    fn start(&mut self) -> Result<(), EnvironmentError> {
        if self.running {
            return Ok(());
        }

        // probe the ip tool before touching anything
        let mut probe = self.ip();
        probe.arg("-V");
        run_checked(probe).map_err(|e| EnvironmentError::StartFailed(e.to_string()))?;

        for node in &self.nodes {
            self.set_up(node, "lo")?;
        }
        for link in &self.links {
            for (node, iface) in &link.endpoints {
                self.set_up(node, iface)?;
            }
        }
        self.running = true;
        log::info!("Network namespace environment started ({} nodes, {} links)", self.nodes.len(), self.links.len());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EnvironmentError> {
        if !self.running && self.nodes.is_empty() {
            return Ok(());
        }

        let mut first_error = None;
        for node in std::mem::take(&mut self.nodes) {
            let ns = self.namespace(&node);
            if let Err(e) = self.ip_run(&["netns", "delete", ns.as_str()]) {
                log::warn!("Failed to delete namespace {}: {}", ns, e);
                first_error.get_or_insert(e);
            }
        }
        self.links.clear();
        self.running = false;
        log::info!("Network namespace environment stopped");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn run_command(&mut self, node: &NodeHandle, command_line: &str) -> Result<CommandOutput, EnvironmentError> {
        if !self.running {
            return Err(EnvironmentError::NotRunning);
        }
        self.ensure_node(node)?;

        let ns = self.namespace(node);
        let mut cmd = self.ip();
        cmd.args(["netns", "exec", ns.as_str(), "sh", "-c", command_line]);
        capture(cmd)
    }

    fn list_links(&self) -> Vec<LinkHandle> {
        self.links.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::command::describe;

    fn env(sudo: bool) -> NetnsEnvironment {
        NetnsEnvironment::new(EnvironmentConfig {
            sudo,
            namespace_prefix: "lab-".to_string(),
            ip_binary: "ip".to_string(),
        })
    }

    #[test]
    fn test_namespace_prefix() {
        let env = env(false);
        assert_eq!(env.namespace(&NodeHandle::new("r0")), "lab-r0");
    }

    #[test]
    fn test_sudo_prefix() {
        let mut cmd = env(true).ip();
        cmd.args(["netns", "list"]);
        assert_eq!(describe(&cmd), "sudo ip netns list");

        let mut cmd = env(false).ip();
        cmd.args(["netns", "list"]);
        assert_eq!(describe(&cmd), "ip netns list");
    }

    #[test]
    fn test_stop_without_nodes_is_noop() {
        let mut env = env(false);
        env.stop().unwrap();
        env.stop().unwrap();
        assert!(!env.is_running());
    }

    #[test]
    fn test_guards_before_touching_the_system() {
        let mut env = env(false);
        let ghost = NodeHandle::new("ghost");
        assert!(matches!(env.run_command(&ghost, "true"), Err(EnvironmentError::NotRunning)));
        assert!(matches!(
            env.create_link(&ghost, "eth0", &NodeHandle::new("other"), "eth0"),
            Err(EnvironmentError::UnknownNode(_))
        ));
    }

    /// `ip` stand-in that appends its arguments to a log and succeeds
    #[cfg(unix)]
    fn logging_ip(dir: &std::path::Path) -> (String, std::path::PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("ip.log");
        let script = dir.join("ip");
        std::fs::write(&script, format!("#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\n", log.display())).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (script.display().to_string(), log)
    }

    #[cfg(unix)]
    #[test]
    fn test_session_command_sequence() {
        use crate::session::Session;
        use crate::shell::Shell;
        use crate::topology::{TopologyBuilder, TopologySpec};
        use std::io::Cursor;

        let dir = tempfile::tempdir().unwrap();
        let (ip_binary, log) = logging_ip(dir.path());
        let env = NetnsEnvironment::new(EnvironmentConfig {
            sudo: false,
            namespace_prefix: "lab-".to_string(),
            ip_binary,
        });

        let mut session = Session::new(env, TopologyBuilder::default());
        let mut shell = Shell::new(Cursor::new(b"exit\n".to_vec()), Vec::new());
        let report = session.run(&TopologySpec::dv_routing_example(), &mut shell).unwrap();
        assert!(report.is_complete());

        let calls: Vec<String> = std::fs::read_to_string(&log).unwrap().lines().map(str::to_string).collect();
        let position = |wanted: &str| calls.iter().position(|c| c == wanted);

        for i in 0..7 {
            let added = position(format!("netns add lab-r{}", i).as_str()).unwrap();
            let lo_up = position(format!("-n lab-r{} link set lo up", i).as_str())
                .unwrap_or_else(|| panic!("lo never brought up in lab-r{}", i));
            assert!(added < lo_up);
            assert!(calls.contains(&format!("netns delete lab-r{}", i)));
        }
        assert_eq!(calls.iter().filter(|c| c.ends_with("link set lo up")).count(), 7);

        // link 0 is r0:eth0 <-> r1:eth1
        assert!(calls.contains(&"-n lab-r0 link set eth0 up".to_string()));
        assert!(calls.contains(&"-n lab-r1 link set eth1 up".to_string()));
        let addr = position("netns exec lab-r0 sh -c ip addr replace 10.0.0.1/24 broadcast 10.0.0.255 dev eth0");
        assert!(addr.is_some());

        // teardown comes last
        assert!(calls.last().unwrap().starts_with("netns delete "));
        assert!(!session.environment().is_running());
    }
}
