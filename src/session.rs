//! Session driver.
//!
//! A [`Session`] owns one environment and walks it through
//! `Created -> Started -> Addressed -> Interactive -> Stopped`. Every exit
//! from [`Session::run`], including errors and panics in the interactive
//! shell, goes through a guard that stops the environment. An interrupted
//! [`Shell`](crate::shell::Shell) returns normally, so Ctrl-C takes the same
//! path.

use std::fmt;
use std::io;

use crate::config::Config;
use crate::env::{Environment, EnvironmentError};
use crate::shell::InteractiveSession;
use crate::topology::{AddressingError, AddressingReport, BuildError, TopologyBuilder, TopologySpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Started,
    Addressed,
    Interactive,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Addressed => "addressed",
            Self::Interactive => "interactive",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} a session in state {state}")]
    InvalidState { action: &'static str, state: SessionState },

    #[error("failed to start environment: {0}")]
    Start(#[source] EnvironmentError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("addressing failed: {0}")]
    Addressing(#[source] AddressingError),

    #[error("interactive session failed: {0}")]
    Shell(#[from] io::Error),

    #[error("failed to stop environment: {0}")]
    Stop(#[source] EnvironmentError),
}

pub struct Session<E: Environment> {
    env: E,
    builder: TopologyBuilder,
    state: SessionState,
    abort_on_addressing_failure: bool,
}

impl<E: Environment> Session<E> {
    pub fn new(env: E, builder: TopologyBuilder) -> Self {
        Self { env, builder, state: SessionState::Created, abort_on_addressing_failure: false }
    }

    pub fn from_config(env: E, config: &Config) -> Self {
        let mut session = Self::new(env, TopologyBuilder::from_config(config));
        session.abort_on_addressing_failure = config.session.abort_on_addressing_failure;
        session
    }

    pub fn abort_on_addressing_failure(mut self, abort: bool) -> Self {
        self.abort_on_addressing_failure = abort;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut E {
        &mut self.env
    }

    fn transition(&mut self, to: SessionState) {
        log::debug!("Session {} -> {}", self.state, to);
        self.state = to;
    }

    /// Start the environment. Only valid on a fresh session.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Created {
            return Err(SessionError::InvalidState { action: "start", state: self.state });
        }
        self.env.start().map_err(SessionError::Start)?;
        self.transition(SessionState::Started);
        Ok(())
    }

    /// Stop the environment. A no-op on a session that is already stopped.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Stopped {
            return Ok(());
        }
        // the session counts as stopped even if teardown reports an error
        self.transition(SessionState::Stopped);
        self.env.stop().map_err(SessionError::Stop)
    }

    /// Start, build and address `spec`, hand over to `shell`, then stop.
    ///
    /// Returns the addressing report of the session.
    pub fn run<S: InteractiveSession>(
        &mut self,
        spec: &TopologySpec,
        shell: &mut S,
    ) -> Result<AddressingReport, SessionError> {
        let mut guard = StopGuard { session: self };
        let outcome = guard.session.drive(spec, shell);
        let stopped = guard.session.stop();

        match (outcome, stopped) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(stop_err)) => Err(stop_err),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(stop_err)) => {
                log::warn!("Teardown after failed session also failed: {}", stop_err);
                Err(e)
            }
        }
    }

    fn drive<S: InteractiveSession>(
        &mut self,
        spec: &TopologySpec,
        shell: &mut S,
    ) -> Result<AddressingReport, SessionError> {
        self.start()?;
        log::info!("Environment started ({})", self.env.kind());

        let network = self.builder.build(spec, &mut self.env)?;
        let mut report = self.builder.address_all(&network, &mut self.env);
        self.transition(SessionState::Addressed);

        if let Some(failure) = report.failure.take() {
            log::warn!(
                "{} of {} links addressed; unaddressed: {:?}",
                report.addressed.len(),
                network.topology().links().len(),
                report.unaddressed.iter().map(|l| l.0).collect::<Vec<_>>()
            );
            if self.abort_on_addressing_failure {
                return Err(SessionError::Addressing(failure));
            }
            report.failure = Some(failure);
        }

        self.transition(SessionState::Interactive);
        log::info!("Starting interactive session");
        shell.run(&mut self.env, &network, &report)?;
        log::info!("Interactive session ended");
        Ok(report)
    }
}

/// Stops the session when dropped, covering early returns and unwinding
struct StopGuard<'a, E: Environment> {
    session: &'a mut Session<E>,
}

impl<E: Environment> Drop for StopGuard<'_, E> {
    fn drop(&mut self) {
        if let Err(e) = self.session.stop() {
            log::error!("Failed to stop environment: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MemoryEnvironment;
    use crate::topology::RealizedTopology;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    /// Shell stand-in that records what it saw and optionally fails
    #[derive(Default)]
    struct ScriptedShell {
        saw_running: bool,
        saw_links: usize,
        fail: bool,
        panic: bool,
    }

    impl InteractiveSession for ScriptedShell {
        fn run(
            &mut self,
            env: &mut dyn Environment,
            network: &RealizedTopology,
            _report: &AddressingReport,
        ) -> io::Result<()> {
            self.saw_running = env.is_running();
            self.saw_links = network.links().len();
            if self.panic {
                panic!("shell blew up");
            }
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal went away"));
            }
            Ok(())
        }
    }

    fn spec() -> TopologySpec {
        TopologySpec::new().node("a").node("b").link("a", "eth0", "b", "eth0")
    }

    #[test]
    fn test_run_happy_path() {
        let mut session = Session::new(MemoryEnvironment::new(), TopologyBuilder::default());
        let mut shell = ScriptedShell::default();

        let report = session.run(&spec(), &mut shell).unwrap();
        assert!(report.is_complete());
        assert!(shell.saw_running);
        assert_eq!(shell.saw_links, 1);
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.environment().stop_count(), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut session = Session::new(MemoryEnvironment::new(), TopologyBuilder::default());
        session.start().unwrap();
        session.stop().unwrap();
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.environment().stop_count(), 1);

        // stopping a session that never started is fine as well
        let mut fresh = Session::new(MemoryEnvironment::new(), TopologyBuilder::default());
        fresh.stop().unwrap();
        assert_eq!(fresh.state(), SessionState::Stopped);
    }

    #[test]
    fn test_cannot_restart() {
        let mut session = Session::new(MemoryEnvironment::new(), TopologyBuilder::default());
        session.stop().unwrap();
        assert!(matches!(
            session.start(),
            Err(SessionError::InvalidState { action: "start", state: SessionState::Stopped })
        ));
    }

    #[test]
    fn test_shell_error_still_stops() {
        let mut session = Session::new(MemoryEnvironment::new(), TopologyBuilder::default());
        let mut shell = ScriptedShell { fail: true, ..Default::default() };

        let err = session.run(&spec(), &mut shell).unwrap_err();
        assert!(matches!(err, SessionError::Shell(_)));
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.environment().is_running());
    }

    #[test]
    fn test_shell_panic_still_stops() {
        let mut session = Session::new(MemoryEnvironment::new(), TopologyBuilder::default());
        let mut shell = ScriptedShell { panic: true, ..Default::default() };

        let result = catch_unwind(AssertUnwindSafe(|| session.run(&spec(), &mut shell)));
        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.environment().stop_count(), 1);
    }

    #[test]
    fn test_start_failure() {
        let mut env = MemoryEnvironment::new();
        env.fail_next_start();
        let mut session = Session::new(env, TopologyBuilder::default());
        let mut shell = ScriptedShell::default();

        let err = session.run(&spec(), &mut shell).unwrap_err();
        assert!(matches!(err, SessionError::Start(EnvironmentError::StartFailed(_))));
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!shell.saw_running);
    }

    #[test]
    fn test_build_failure_stops() {
        let bad = TopologySpec::new().node("a").node("a");
        let mut session = Session::new(MemoryEnvironment::new(), TopologyBuilder::default());

        let err = session.run(&bad, &mut ScriptedShell::default()).unwrap_err();
        assert!(matches!(err, SessionError::Build(BuildError::Topology(_))));
        assert_eq!(session.environment().start_count(), 1);
        assert_eq!(session.environment().stop_count(), 1);
    }

    #[test]
    fn test_addressing_failure_policy() {
        // default: continue into the shell with a partial report
        let mut env = MemoryEnvironment::new();
        env.fail_commands_matching("b", "eth0");
        let mut session = Session::new(env, TopologyBuilder::default());
        let mut shell = ScriptedShell::default();
        let report = session.run(&spec(), &mut shell).unwrap();
        assert!(shell.saw_running);
        assert_eq!(report.failed_link().map(|l| l.0), Some(0));

        // abort: no shell, environment stopped
        let mut env = MemoryEnvironment::new();
        env.fail_commands_matching("b", "eth0");
        let mut session = Session::new(env, TopologyBuilder::default()).abort_on_addressing_failure(true);
        let mut shell = ScriptedShell::default();
        let err = session.run(&spec(), &mut shell).unwrap_err();
        assert!(matches!(err, SessionError::Addressing(_)));
        assert!(!shell.saw_running);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_interrupted_shell_stops_environment() {
        use crate::shell::{ChannelInput, Shell, ShellInput};
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        tx.send(ShellInput::Interrupt).unwrap();
        tx.send(ShellInput::Line("net".to_string())).unwrap();
        let mut shell = Shell::with_input(ChannelInput::new(rx), Vec::new());
        let mut session = Session::new(MemoryEnvironment::new(), TopologyBuilder::default());

        let report = session.run(&spec(), &mut shell).unwrap();
        assert!(report.is_complete());
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.environment().is_running());
        assert_eq!(session.environment().stop_count(), 1);
    }
}
