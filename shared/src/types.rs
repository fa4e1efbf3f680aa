use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// One advertised DNS-SD service instance, as reconstructed from observed PTR,
/// SRV and TXT records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// First label of the Service Instance Name, e.g. "Living Room"
    pub instance_name: String,

    /// Service type, e.g. "_airplay._tcp"
    pub service_type: String,

    /// Administrative domain, normally "local"
    pub domain: String,

    /// SRV target host, once an SRV record has been matched
    pub host: Option<String>,

    /// SRV port, once an SRV record has been matched
    pub port: Option<u16>,

    /// TXT strings in wire order, once a TXT record has been matched
    pub extras: Option<Vec<String>>,

    /// Full Service Instance Name from the PTR record. Unique key.
    pub raw_name: String,

    /// When the defining PTR was first observed
    pub first_seen: DateTime<Utc>,
}

/// A network endpoint referenced by A/AAAA records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Owner name of the address records. Unique key.
    pub name: String,

    pub ipv4_addr: Option<Ipv4Addr>,

    pub ipv6_addr: Option<Ipv6Addr>,

    /// When the first address record for this name was observed
    pub first_seen: DateTime<Utc>,
}

impl Host {
    /// Whether either of the host's addresses equals `addr`.
    pub fn has_address(&self, addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => self.ipv4_addr == Some(v4),
            IpAddr::V6(v6) => self.ipv6_addr == Some(v6),
        }
    }
}

/// A PTR question for a DNS-SD service type, i.e. someone browsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceQuery {
    /// Source address of the packet carrying the question
    pub source_addr: IpAddr,

    /// Service type being browsed, e.g. "_googlecast._tcp"
    pub service_type: String,

    /// Question name as seen on the wire
    pub raw_query: String,
}

/// Read-only copy of the discovery state handed to readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySnapshot {
    pub instances: Vec<ServiceInstance>,
    pub hosts: Vec<Host>,
    pub queries: Vec<ServiceQuery>,

    /// Number of SRV/TXT records still waiting for their PTR
    pub pending_records: usize,

    pub taken_at: DateTime<Utc>,
}

/// Readable name of a DNS-SD service type from the lister's type database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTypeName {
    /// e.g. "_airplay._tcp"
    pub service_type: String,

    /// e.g. "AirPlay Remote Video"
    pub description: String,
}

/// A flat service record reported by the external service lister
/// (avahi-browse). Kept apart from the reconciled state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedService {
    /// e.g. "eno1"
    pub interface: String,

    /// e.g. "IPv4"
    pub protocol: String,

    pub name: String,
    pub service_type: String,
    pub domain: String,

    /// Resolution fields, empty until a resolved line has been seen
    pub hostname: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub txt_records: Vec<String>,
}
