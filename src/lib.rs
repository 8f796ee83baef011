//! # Linknet - emulated multi-router networks with per-link addressing
//!
//! This library builds a topology of virtual routers connected by
//! point-to-point links with explicitly named interfaces, gives every link its
//! own subnet and configures both ends of each link.
//!
//! ## Addressing
//!
//! Links are numbered in the order they are declared. Link `i` receives the
//! block `BASE.i.0/24` (default base `10.0`); its first-declared endpoint gets
//! `.1`, the second `.2`, netmask `255.255.255.0`, broadcast `BASE.i.255`.
//! The ordinal is stored on the link when it is created, so the same
//! declaration always yields the same addresses.
//!
//! ## Architecture
//!
//! - `topology`: graph types, declarative specs and the builder
//! - `ip`: subnet allocation and link configuration
//! - `env`: the virtualization environment interface with a Linux network
//!   namespace backend and an in-memory backend
//! - `session`: lifecycle driver with guaranteed teardown
//! - `shell`: interactive command session
//! - `config` / `config_loader`: YAML configuration
//! - `utils`: IPv4 helpers and name validation
//!
//! ## Example Usage
//!
//! ```rust
//! use linknet::env::{Environment, MemoryEnvironment};
//! use linknet::topology::{TopologyBuilder, TopologySpec};
//!
//! let spec = TopologySpec::dv_routing_example();
//! let builder = TopologyBuilder::default();
//! let mut env = MemoryEnvironment::new();
//!
//! let network = builder.build(&spec, &mut env)?;
//! env.start()?;
//! let report = builder.address_all(&network, &mut env);
//!
//! assert!(report.is_complete());
//! assert_eq!(report.addressed[8].cidr(), "10.0.8.0/24");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Each module exposes its own `thiserror` error type. The binary wraps them
//! with `color_eyre` for reporting.

pub mod config;
pub mod config_loader;
pub mod env;
pub mod ip;
pub mod session;
pub mod shell;
pub mod topology;
pub mod utils;
