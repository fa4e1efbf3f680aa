use std::net::IpAddr;
use shared::protocol::META_QUERY_NAME;
use shared::types::ServiceQuery;
use crate::discovery::deferred::{DeferredRecord, Enrichment};
use crate::dns::message::{Question, RecordData, ResourceRecord};
use crate::dns::name::{host_matches, is_service_name, split_host};

/// A Service Instance Name split into its parts,
/// `<instance>.<service-type>.<domain>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceName {
    pub raw_name: String,
    pub instance_name: String,
    pub service_type: String,
    pub domain: String,
}

/// What a single resource record means for the discovery state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// PTR advertising a service instance
    NewInstance(InstanceName),
    /// SRV or TXT describing an instance, applied once the instance is known
    Enrich(DeferredRecord),
    /// A or AAAA for a host name
    HostAddress { name: String, addr: IpAddr },
    Ignore(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// PTR from the service type enumeration meta-query
    MetaQuery,
    /// Owner name is not under `_tcp.local` or `_udp.local`
    NotServiceName,
    /// PTR target cannot be split into instance, type and domain
    BadInstanceName,
    UnsupportedType,
}

/// Split a Service Instance Name. Needs at least three labels.
pub fn parse_instance_name(raw_name: &str) -> Option<InstanceName> {
    let labels = split_host(raw_name);
    if labels.len() < 3 {
        return None;
    }

    let last = labels.len() - 1;
    Some(InstanceName {
        raw_name: raw_name.to_string(),
        instance_name: labels[0].to_string(),
        service_type: labels[1..last].join("."),
        domain: labels[last].to_string(),
    })
}

pub fn classify(record: &ResourceRecord) -> Action {
    match &record.data {
        RecordData::Ptr(target) => {
            // Enumeration PTRs point at service types, not instances.
            if host_matches(&record.name, META_QUERY_NAME) {
                return Action::Ignore(IgnoreReason::MetaQuery);
            }
            if !is_service_name(&record.name) {
                return Action::Ignore(IgnoreReason::NotServiceName);
            }
            match parse_instance_name(target) {
                Some(name) => Action::NewInstance(name),
                None => Action::Ignore(IgnoreReason::BadInstanceName),
            }
        }
        RecordData::Srv { target, port } => enrich(record, || Enrichment::Srv {
            target: target.clone(),
            port: *port,
        }),
        RecordData::Txt(strings) => enrich(record, || Enrichment::Txt(strings.clone())),
        RecordData::A(addr) => Action::HostAddress {
            name: record.name.clone(),
            addr: IpAddr::V4(*addr),
        },
        RecordData::Aaaa(addr) => Action::HostAddress {
            name: record.name.clone(),
            addr: IpAddr::V6(*addr),
        },
        RecordData::Other => Action::Ignore(IgnoreReason::UnsupportedType),
    }
}

fn enrich(record: &ResourceRecord, enrichment: impl FnOnce() -> Enrichment) -> Action {
    if !is_service_name(&record.name) {
        return Action::Ignore(IgnoreReason::NotServiceName);
    }
    Action::Enrich(DeferredRecord {
        owner: record.name.clone(),
        enrichment: enrichment(),
    })
}

/// A PTR question for a service type means `source` is browsing for it.
pub fn service_query(source: IpAddr, question: &Question) -> Option<ServiceQuery> {
    if !question.is_ptr || !is_service_name(&question.name) {
        return None;
    }

    let labels = split_host(&question.name);
    Some(ServiceQuery {
        source_addr: source,
        service_type: labels[..labels.len() - 1].join("."),
        raw_query: question.name.clone(),
    })
}
