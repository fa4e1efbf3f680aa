use std::io;
use std::net::SocketAddr;
use std::process::ExitStatus;
use thiserror::Error;

/// A UDP payload that is not a structurally valid DNS message.
#[derive(Debug, Error)]
#[error("malformed DNS message: {0}")]
pub struct DecodeError(#[from] pub hickory_proto::error::ProtoError);

/// Failure to set up the passive mDNS listener. Fatal at startup.
#[derive(Debug, Error)]
pub enum CaptureOpenError {
    #[error("capture has neither IPv4 nor IPv6 enabled")]
    NoFamilies,

    #[error("failed to create {family} socket: {source}")]
    Socket {
        family: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to set {option} on {family} socket: {source}")]
    SocketOption {
        family: &'static str,
        option: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to join multicast group {group}: {source}")]
    JoinGroup {
        group: String,
        #[source]
        source: io::Error,
    },
}

/// Failure to obtain a listing from the external service lister.
#[derive(Debug, Error)]
pub enum ListerError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Exit {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("unknown line type {kind:?} in lister output")]
    UnknownLineType { kind: String },

    #[error("type database dumps disagree: {types} types but {names} names")]
    TypeNameMismatch { types: usize, names: usize },

    #[error("truncated {kind:?} line in lister output: expected {expected} fields, got {got}")]
    Truncated {
        kind: String,
        expected: usize,
        got: usize,
    },
}
