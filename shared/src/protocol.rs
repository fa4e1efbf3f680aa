use std::net::{Ipv4Addr, Ipv6Addr};

/// UDP port used by multicast DNS
pub const MDNS_PORT: u16 = 5353;

/// mDNS multicast groups
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// Service type enumeration meta-query (RFC 6763 section 9)
pub const META_QUERY_NAME: &str = "_services._dns-sd._udp.local";

/// Owner name patterns of records that describe DNS-SD services
pub const SERVICE_NAME_PATTERNS: [&str; 2] = ["**._tcp.local", "**._udp.local"];

/// API path prefix
pub const API_PREFIX: &str = "/v1";
