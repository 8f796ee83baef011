//! Link addressing module.
//!
//! This module maps links to /24 subnets by creation ordinal and applies the
//! resulting host addresses to both ends of each link.

pub mod allocator;
pub mod configurator;

// Re-export commonly used types
pub use allocator::{AllocationError, SubnetAllocator, SubnetAssignment, LINK_PREFIX_LEN, MAX_LINKS};
pub use configurator::{ConfigurationError, ConfigurationFailure, LinkConfigurator};
