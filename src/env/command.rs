//! Helpers around [`std::process::Command`].

use std::process::{self, Command, Stdio};

use super::EnvironmentError;

/// Exit status and combined output of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { status: 0, output: output.into() }
    }

    pub fn failed(status: i32, output: impl Into<String>) -> Self {
        Self { status, output: output.into() }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

impl From<process::Output> for CommandOutput {
    fn from(value: process::Output) -> Self {
        let mut output = String::from_utf8_lossy(&value.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&value.stderr));
        // killed by a signal: no exit code
        Self { status: value.status.code().unwrap_or(-1), output }
    }
}

/// Render a command for logs and error messages
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Run a command and capture its output, whatever the exit status
pub fn capture(mut cmd: Command) -> Result<CommandOutput, EnvironmentError> {
    let rendered = describe(&cmd);
    log::debug!("Running: {}", rendered);

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| EnvironmentError::Spawn { command: rendered.clone(), source })?;

    Ok(output.into())
}

/// Run a command, turning a non-zero exit status into an error
pub fn run_checked(cmd: Command) -> Result<CommandOutput, EnvironmentError> {
    let rendered = describe(&cmd);
    let output = capture(cmd)?;
    if !output.success() {
        log::debug!("'{}' returned status {}: {}", rendered, output.status, output.output.trim());
        return Err(EnvironmentError::CommandFailed {
            command: rendered,
            status: output.status,
            output: output.output.trim().to_string(),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let mut cmd = Command::new("ip");
        cmd.args(["netns", "add", "r0"]);
        assert_eq!(describe(&cmd), "ip netns add r0");
    }

    #[test]
    fn test_output_constructors() {
        assert!(CommandOutput::ok("").success());
        let failed = CommandOutput::failed(2, "Cannot find device");
        assert!(!failed.success());
        assert_eq!(failed.status, 2);
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let cmd = Command::new("/nonexistent/linknet-test-binary");
        let err = capture(cmd).unwrap_err();
        assert!(matches!(err, EnvironmentError::Spawn { .. }));
    }
}
