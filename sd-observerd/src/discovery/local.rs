use std::net::IpAddr;
use anyhow::{Context, Result};
use chrono::Utc;
use shared::types::Host;

/// Build a `Host` for this machine: `<hostname>.local` with its first
/// non-loopback IPv4 and IPv6 addresses.
pub fn local_host() -> Result<Host> {
    let hostname = hostname::get()
        .context("Failed to get system hostname")?
        .to_string_lossy()
        .to_string();

    let interfaces = if_addrs::get_if_addrs()
        .context("Failed to enumerate network interfaces")?;

    let mut host = Host {
        name: format!("{}.local", hostname.trim_end_matches(".local")),
        ipv4_addr: None,
        ipv6_addr: None,
        first_seen: Utc::now(),
    };

    for iface in interfaces.iter().filter(|iface| !iface.is_loopback()) {
        match iface.ip() {
            IpAddr::V4(v4) if host.ipv4_addr.is_none() => host.ipv4_addr = Some(v4),
            IpAddr::V6(v6) if host.ipv6_addr.is_none() => host.ipv6_addr = Some(v6),
            _ => {}
        }
    }

    Ok(host)
}
