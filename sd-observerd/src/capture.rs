//! Passive mDNS listener.
//!
//! Binds UDP/5353 with address reuse so it can sit next to the system's mDNS
//! responder, joins the mDNS groups and forwards every datagram it receives.
//! Nothing is ever sent.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;
use anyhow::Result;
use shared::protocol::{MDNS_GROUP_V4, MDNS_GROUP_V6, MDNS_PORT};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use crate::config::CaptureConfig;
use crate::error::CaptureOpenError;

/// One received UDP datagram.
#[derive(Debug, Clone)]
pub struct CapturedDatagram {
    pub src: SocketAddr,
    /// Address of the listener that received the datagram. This is the
    /// group address when bound with `multicast_only`, otherwise the
    /// wildcard address, never the per-packet destination.
    pub local: SocketAddr,
    pub payload: Vec<u8>,
}

struct Listener {
    socket: UdpSocket,
    local: SocketAddr,
}

pub struct MdnsCapture {
    listeners: Vec<Listener>,
    recv_buffer: usize,
}

impl MdnsCapture {
    /// Open one listening socket per enabled address family.
    pub fn open(config: &CaptureConfig) -> Result<Self, CaptureOpenError> {
        if !config.ipv4 && !config.ipv6 {
            return Err(CaptureOpenError::NoFamilies);
        }

        let mut listeners = Vec::new();
        if config.ipv4 {
            listeners.push(open_v4(config)?);
        }
        if config.ipv6 {
            listeners.push(open_v6(config)?);
        }

        for listener in &listeners {
            tracing::info!(addr = %listener.local, "mDNS capture listening");
        }

        Ok(Self {
            listeners,
            recv_buffer: config.recv_buffer,
        })
    }

    /// Forward datagrams into `tx` until cancelled or the receiver is gone.
    /// A full channel makes the capture wait. Sockets are closed on return.
    pub async fn run(self, tx: mpsc::Sender<CapturedDatagram>, cancel: CancellationToken) -> Result<()> {
        let mut tasks = JoinSet::new();
        for listener in self.listeners {
            tasks.spawn(receive_loop(listener, self.recv_buffer, tx.clone(), cancel.clone()));
        }
        drop(tx);

        while let Some(result) = tasks.join_next().await {
            result?;
        }

        tracing::info!("mDNS capture stopped");
        Ok(())
    }
}

async fn receive_loop(
    listener: Listener,
    recv_buffer: usize,
    tx: mpsc::Sender<CapturedDatagram>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; recv_buffer];
    let mut failures: u32 = 0;

    loop {
        tokio::select! {
            result = listener.socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, src)) => {
                        failures = 0;
                        let datagram = CapturedDatagram {
                            src,
                            local: listener.local,
                            payload: buf[..len].to_vec(),
                        };
                        if tx.send(datagram).await.is_err() {
                            tracing::debug!(addr = %listener.local, "datagram consumer gone");
                            break;
                        }
                    }
                    Err(e) => {
                        failures = failures.saturating_add(1);
                        let delay = recv_backoff(failures);
                        tracing::warn!(error = %e, addr = %listener.local, failures, ?delay, "recv_from failed");
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.cancelled() => break,
                        }
                    }
                }
            }

            _ = cancel.cancelled() => break,
        }
    }
}

/// Delay before the next receive after `failures` consecutive errors:
/// doubling from 10ms, capped at one second.
fn recv_backoff(failures: u32) -> Duration {
    const BASE_MS: u64 = 10;
    const MAX_MS: u64 = 1000;

    let exp = failures.saturating_sub(1).min(10);
    Duration::from_millis((BASE_MS << exp).min(MAX_MS))
}

fn open_v4(config: &CaptureConfig) -> Result<Listener, CaptureOpenError> {
    const FAMILY: &str = "IPv4";

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|source| CaptureOpenError::Socket { family: FAMILY, source })?;
    set_reuse(&socket, FAMILY)?;

    let ip = if config.multicast_only { MDNS_GROUP_V4 } else { Ipv4Addr::UNSPECIFIED };
    let addr = SocketAddr::V4(SocketAddrV4::new(ip, MDNS_PORT));
    socket
        .bind(&addr.into())
        .map_err(|source| CaptureOpenError::Bind { addr, source })?;

    socket
        .join_multicast_v4(&MDNS_GROUP_V4, &config.interface_v4)
        .map_err(|source| CaptureOpenError::JoinGroup {
            group: format!("{} on {}", MDNS_GROUP_V4, config.interface_v4),
            source,
        })?;

    into_listener(socket, addr, FAMILY)
}

fn open_v6(config: &CaptureConfig) -> Result<Listener, CaptureOpenError> {
    const FAMILY: &str = "IPv6";

    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|source| CaptureOpenError::Socket { family: FAMILY, source })?;
    set_reuse(&socket, FAMILY)?;
    socket
        .set_only_v6(true)
        .map_err(|source| CaptureOpenError::SocketOption { family: FAMILY, option: "IPV6_V6ONLY", source })?;

    let addr = if config.multicast_only {
        SocketAddr::V6(SocketAddrV6::new(MDNS_GROUP_V6, MDNS_PORT, 0, config.interface_v6))
    } else {
        SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, MDNS_PORT, 0, 0))
    };
    socket
        .bind(&addr.into())
        .map_err(|source| CaptureOpenError::Bind { addr, source })?;

    socket
        .join_multicast_v6(&MDNS_GROUP_V6, config.interface_v6)
        .map_err(|source| CaptureOpenError::JoinGroup {
            group: format!("{} on interface {}", MDNS_GROUP_V6, config.interface_v6),
            source,
        })?;

    into_listener(socket, addr, FAMILY)
}

fn set_reuse(socket: &Socket, family: &'static str) -> Result<(), CaptureOpenError> {
    socket
        .set_reuse_address(true)
        .map_err(|source| CaptureOpenError::SocketOption { family, option: "SO_REUSEADDR", source })?;
    #[cfg(unix)]
    {
        socket
            .set_reuse_port(true)
            .map_err(|source| CaptureOpenError::SocketOption { family, option: "SO_REUSEPORT", source })?;
    }
    Ok(())
}

fn into_listener(socket: Socket, local: SocketAddr, family: &'static str) -> Result<Listener, CaptureOpenError> {
    socket
        .set_nonblocking(true)
        .map_err(|source| CaptureOpenError::SocketOption { family, option: "O_NONBLOCK", source })?;

    let socket = UdpSocket::from_std(socket.into())
        .map_err(|source| CaptureOpenError::Socket { family, source })?;

    Ok(Listener { socket, local })
}
