use serde::{Deserialize, Serialize};

use crate::utils::ip_utils::BasePrefix;

/// Top-level configuration structure that mirrors the YAML configuration.
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub general: General,
    pub addressing: Addressing,
    pub environment: EnvironmentConfig,
    pub session: SessionConfig,
}

/// General settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct General {
    /// Default log filter (overridden by RUST_LOG)
    pub log_level: String,
}

impl Default for General {
    fn default() -> Self {
        Self { log_level: "info".to_string() }
    }
}

/// Which tool sets interface addresses inside a namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AddressCommand {
    /// `ip addr replace A/len broadcast B dev IF`
    #[default]
    Ip,
    /// `ifconfig IF A netmask M broadcast B`
    Ifconfig,
}

/// Link addressing settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Addressing {
    /// Two-octet prefix shared by all link subnets
    pub base_prefix: BasePrefix,
    pub command: AddressCommand,
}

/// Settings for the network namespace environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Prefix `ip` invocations with sudo
    pub sudo: bool,
    /// Prepended to node names to form namespace names
    pub namespace_prefix: String,
    /// Path or name of the `ip` binary
    pub ip_binary: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            sudo: false,
            namespace_prefix: String::new(),
            ip_binary: "ip".to_string(),
        }
    }
}

/// Session behavior
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Stop the session instead of opening the shell when addressing fails
    pub abort_on_addressing_failure: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid environment configuration: {0}")]
    InvalidEnvironment(String),
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.general.log_level.trim().is_empty() {
            return Err(ValidationError::InvalidGeneral("log_level cannot be empty".to_string()));
        }

        if self.environment.ip_binary.trim().is_empty() {
            return Err(ValidationError::InvalidEnvironment("ip_binary cannot be empty".to_string()));
        }
        let prefix = &self.environment.namespace_prefix;
        if prefix.contains('/') || prefix.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidEnvironment(format!(
                "namespace_prefix '{}' may not contain '/' or whitespace",
                prefix
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.addressing.base_prefix, BasePrefix([10, 0]));
        assert_eq!(config.addressing.command, AddressCommand::Ip);
        assert_eq!(config.environment.ip_binary, "ip");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
general:
  log_level: debug
addressing:
  base_prefix: "172.16"
  command: ifconfig
environment:
  sudo: true
  namespace_prefix: "lab-"
session:
  abort_on_addressing_failure: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.addressing.base_prefix, BasePrefix([172, 16]));
        assert_eq!(config.addressing.command, AddressCommand::Ifconfig);
        assert!(config.environment.sudo);
        assert_eq!(config.environment.namespace_prefix, "lab-");
        assert_eq!(config.environment.ip_binary, "ip");
        assert!(config.session.abort_on_addressing_failure);
    }

    #[test]
    fn test_bad_prefix_rejected_at_parse() {
        let yaml = "addressing:\n  base_prefix: \"10.0.0\"\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_yaml::from_str::<Config>("general:\n  stop_time: 1h\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_environment() {
        let mut config = Config::default();
        config.environment.namespace_prefix = "lab/".to_string();
        assert!(matches!(config.validate(), Err(ValidationError::InvalidEnvironment(_))));

        let mut config = Config::default();
        config.environment.ip_binary = " ".to_string();
        assert!(config.validate().is_err());
    }
}
