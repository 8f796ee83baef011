//! Name validation utilities.
//!
//! Node names become network namespace names and interface names become
//! kernel link names, so both have to survive the `ip` tool and the shell.

use crate::topology::TopologyError;

/// Longest interface name the kernel accepts (IFNAMSIZ minus the NUL)
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

fn check_charset(kind: &'static str, name: &str) -> Result<(), TopologyError> {
    let invalid = |reason: &str| TopologyError::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("reserved path component"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid(&format!("unsupported character {:?}", c)));
    }
    Ok(())
}

/// Validate a node name
///
/// # Examples
/// ```
/// use linknet::utils::validation::validate_node_name;
///
/// assert!(validate_node_name("r0").is_ok());
/// assert!(validate_node_name("r 0").is_err());
/// ```
pub fn validate_node_name(name: &str) -> Result<(), TopologyError> {
    check_charset("node", name)
}

/// Validate an interface name, including the kernel length limit
pub fn validate_interface_name(name: &str) -> Result<(), TopologyError> {
    check_charset("interface", name)?;
    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(TopologyError::InvalidName {
            kind: "interface",
            name: name.to_string(),
            reason: format!("longer than {} characters", MAX_INTERFACE_NAME_LEN),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["r0", "router-1", "edge_a.b", "eth0"] {
            assert!(validate_node_name(name).is_ok(), "{} should be valid", name);
            assert!(validate_interface_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", ".", "..", "r/0", "r 0", "eth0;reboot"] {
            assert!(validate_node_name(name).is_err(), "{:?} should be rejected", name);
        }
    }

    #[test]
    fn test_interface_length_limit() {
        assert!(validate_interface_name("a23456789012345").is_ok());
        let err = validate_interface_name("a234567890123456").unwrap_err();
        assert!(matches!(err, TopologyError::InvalidName { kind: "interface", .. }));
        // node names have no such limit
        assert!(validate_node_name("a234567890123456").is_ok());
    }
}
