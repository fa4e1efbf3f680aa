use std::net::{Ipv4Addr, Ipv6Addr};
use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::{Host, ServiceInstance};

/// Stable fields of an instance. first_seen is left out so that the
/// fingerprint only moves when discovered data does.
#[derive(Serialize)]
struct InstanceView<'a> {
    raw_name: &'a str,
    instance_name: &'a str,
    service_type: &'a str,
    domain: &'a str,
    host: Option<&'a str>,
    port: Option<u16>,
    extras: Option<&'a [String]>,
}

#[derive(Serialize)]
struct HostView<'a> {
    name: &'a str,
    ipv4_addr: Option<Ipv4Addr>,
    ipv6_addr: Option<Ipv6Addr>,
}

#[derive(Serialize)]
struct StateView<'a> {
    instances: Vec<InstanceView<'a>>,
    hosts: Vec<HostView<'a>>,
}

/// Computes a SHA-256 fingerprint of the discovered instances and hosts.
/// Entries are sorted by key so the result does not depend on arrival order.
pub fn compute_hash(instances: &[ServiceInstance], hosts: &[Host]) -> String {
    let mut instance_views: Vec<InstanceView<'_>> = instances
        .iter()
        .map(|i| InstanceView {
            raw_name: &i.raw_name,
            instance_name: &i.instance_name,
            service_type: &i.service_type,
            domain: &i.domain,
            host: i.host.as_deref(),
            port: i.port,
            extras: i.extras.as_deref(),
        })
        .collect();
    instance_views.sort_by(|a, b| a.raw_name.cmp(b.raw_name));

    let mut host_views: Vec<HostView<'_>> = hosts
        .iter()
        .map(|h| HostView {
            name: &h.name,
            ipv4_addr: h.ipv4_addr,
            ipv6_addr: h.ipv6_addr,
        })
        .collect();
    host_views.sort_by(|a, b| a.name.cmp(b.name));

    let view = StateView {
        instances: instance_views,
        hosts: host_views,
    };
    let json = serde_json::to_string(&view)
        .expect("Failed to serialize discovery state for hashing");

    let hash = Sha256::digest(json.as_bytes());
    hex::encode(hash)
}
