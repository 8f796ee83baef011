use crate::config::{AddressCommand, Config};
use crate::utils::ip_utils::BasePrefix;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let content = fs::read_to_string(config_path)
        .wrap_err_with(|| format!("Failed to read configuration file '{}'", config_path.display()))?;

    // An empty document is not a mapping, treat it as "all defaults"
    let config: Config = if content.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse configuration file '{}'", config_path.display()))?
    };

    config.validate()?;

    Ok(config)
}

/// Load the file if given, otherwise fall back to defaults
pub fn load_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_prefix: Option<BasePrefix>,
    pub command: Option<AddressCommand>,
    pub sudo: bool,
    pub log_level: Option<String>,
}

/// Apply CLI overrides to a configuration
pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(prefix) = overrides.base_prefix {
        info!("Overriding base prefix: {} -> {}", config.addressing.base_prefix, prefix);
        config.addressing.base_prefix = prefix;
    }
    if let Some(command) = overrides.command {
        config.addressing.command = command;
    }
    if overrides.sudo {
        config.environment.sudo = true;
    }
    if let Some(level) = &overrides.log_level {
        config.general.log_level = level.clone();
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
addressing:
  base_prefix: "192.168"
environment:
  namespace_prefix: "dv-"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.addressing.base_prefix, BasePrefix([192, 168]));
        assert_eq!(config.environment.namespace_prefix, "dv-");
    }

    #[test]
    fn test_load_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_invalid_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "environment:\n  ip_binary: \"\"\n").unwrap();
        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("/nonexistent/linknet.yaml")).is_err());
        assert_eq!(load_or_default(None).unwrap(), Config::default());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let overrides = CliOverrides {
            base_prefix: Some(BasePrefix([10, 1])),
            command: Some(AddressCommand::Ifconfig),
            sudo: true,
            log_level: Some("debug".to_string()),
        };

        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.addressing.base_prefix, BasePrefix([10, 1]));
        assert_eq!(config.addressing.command, AddressCommand::Ifconfig);
        assert!(config.environment.sudo);
        assert_eq!(config.general.log_level, "debug");
    }
}
