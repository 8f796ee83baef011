//! IPv4 helpers: base prefix parsing and mask arithmetic for link subnets.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors from parsing a two-octet base prefix
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrefixError {
    #[error("base prefix '{0}' must have exactly two dotted octets (e.g. \"10.0\")")]
    WrongOctetCount(String),

    #[error("base prefix '{prefix}' has invalid octet '{octet}'")]
    InvalidOctet { prefix: String, octet: String },
}

/// The first two octets shared by every link subnet, e.g. `10.0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BasePrefix(pub [u8; 2]);

impl BasePrefix {
    pub const DEFAULT: BasePrefix = BasePrefix([10, 0]);

    /// Address `prefix.third.fourth`
    pub fn addr(&self, third: u8, fourth: u8) -> Ipv4Addr {
        Ipv4Addr::new(self.0[0], self.0[1], third, fourth)
    }
}

impl Default for BasePrefix {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BasePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0[0], self.0[1])
    }
}

impl FromStr for BasePrefix {
    type Err = PrefixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 2 {
            return Err(PrefixError::WrongOctetCount(s.to_string()));
        }

        let mut octets = [0u8; 2];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            // u8::from_str accepts a leading '+', an address octet should not
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PrefixError::InvalidOctet { prefix: s.to_string(), octet: part.to_string() });
            }
            *slot = part
                .parse::<u8>()
                .map_err(|_| PrefixError::InvalidOctet { prefix: s.to_string(), octet: part.to_string() })?;
        }
        Ok(BasePrefix(octets))
    }
}

impl Serialize for BasePrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BasePrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Dotted netmask for a prefix length, e.g. 24 -> 255.255.255.0
pub fn netmask_from_prefix_len(prefix_len: u8) -> Ipv4Addr {
    let bits = match prefix_len {
        0 => 0,
        n if n >= 32 => u32::MAX,
        n => u32::MAX << (32 - u32::from(n)),
    };
    Ipv4Addr::from(bits)
}

/// Broadcast address of the network containing `addr`
pub fn broadcast_address(addr: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    let mask = u32::from(netmask_from_prefix_len(prefix_len));
    Ipv4Addr::from(u32::from(addr) | !mask)
}

/// Network address of the network containing `addr`
pub fn network_address(addr: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    let mask = u32::from(netmask_from_prefix_len(prefix_len));
    Ipv4Addr::from(u32::from(addr) & mask)
}

/// Check whether two networks share any address
pub fn networks_overlap(a: Ipv4Addr, a_len: u8, b: Ipv4Addr, b_len: u8) -> bool {
    let shorter = a_len.min(b_len);
    network_address(a, shorter) == network_address(b, shorter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_prefix() {
        assert_eq!("10.0".parse::<BasePrefix>().unwrap(), BasePrefix([10, 0]));
        assert_eq!(" 192.168 ".parse::<BasePrefix>().unwrap(), BasePrefix([192, 168]));
        assert_eq!(BasePrefix::default().to_string(), "10.0");
    }

    #[test]
    fn test_parse_base_prefix_errors() {
        assert!(matches!("10".parse::<BasePrefix>(), Err(PrefixError::WrongOctetCount(_))));
        assert!(matches!("10.0.0".parse::<BasePrefix>(), Err(PrefixError::WrongOctetCount(_))));
        assert!(matches!("10.256".parse::<BasePrefix>(), Err(PrefixError::InvalidOctet { .. })));
        assert!(matches!("10.+1".parse::<BasePrefix>(), Err(PrefixError::InvalidOctet { .. })));
        assert!(matches!("10.".parse::<BasePrefix>(), Err(PrefixError::InvalidOctet { .. })));
    }

    #[test]
    fn test_mask_helpers() {
        assert_eq!(netmask_from_prefix_len(24), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(netmask_from_prefix_len(0), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(netmask_from_prefix_len(32), Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(
            broadcast_address(Ipv4Addr::new(10, 0, 7, 1), 24),
            Ipv4Addr::new(10, 0, 7, 255)
        );
        assert_eq!(network_address(Ipv4Addr::new(10, 0, 7, 2), 24), Ipv4Addr::new(10, 0, 7, 0));
    }

    #[test]
    fn test_overlap() {
        let a = Ipv4Addr::new(10, 0, 1, 0);
        assert!(networks_overlap(a, 24, Ipv4Addr::new(10, 0, 1, 128), 25));
        assert!(networks_overlap(a, 24, Ipv4Addr::new(10, 0, 0, 0), 16));
        assert!(!networks_overlap(a, 24, Ipv4Addr::new(10, 0, 2, 0), 24));
    }

    #[test]
    fn test_prefix_serde() {
        let prefix: BasePrefix = serde_yaml::from_str("\"172.16\"").unwrap();
        assert_eq!(prefix, BasePrefix([172, 16]));
        assert!(serde_yaml::from_str::<BasePrefix>("\"172\"").is_err());
        assert_eq!(serde_json::to_string(&prefix).unwrap(), "\"172.16\"");
    }
}
