//! Shared utilities: IPv4 helpers and name validation.

pub mod ip_utils;
pub mod validation;

pub use ip_utils::{BasePrefix, PrefixError};
pub use validation::{validate_interface_name, validate_node_name};
