use std::net::IpAddr;
use crate::capture::CapturedDatagram;
use crate::discovery::classify::{classify, service_query, Action};
use crate::discovery::deferred::Queued;
use crate::discovery::state::DiscoveryState;
use crate::dns::message::{decode, DnsMessage};
use crate::error::DecodeError;

/// What one packet did to the discovery state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub records: usize,
    pub new_instances: usize,
    pub host_updates: usize,
    pub deferred: usize,
    /// Queued SRV/TXT payloads overwritten by a repeat announcement
    pub replaced: usize,
    pub resolved: usize,
    pub new_queries: usize,
}

impl IngestReport {
    pub fn changed(&self) -> bool {
        self.new_instances + self.host_updates + self.deferred + self.resolved + self.new_queries > 0
    }
}

/// Applies observed mDNS packets to a [`DiscoveryState`].
///
/// PTR records create instances, A/AAAA records update hosts, and SRV/TXT
/// records go through the deferred queue so they are applied after any PTR
/// that defines their instance, whether it arrived in the same packet or a
/// later one.
#[derive(Debug)]
pub struct Reconciler {
    state: DiscoveryState,
}

impl Reconciler {
    pub fn new(state: DiscoveryState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &DiscoveryState {
        &self.state
    }

    /// Decode and apply one captured datagram. A decode error leaves the
    /// state untouched.
    pub fn ingest(&mut self, datagram: &CapturedDatagram) -> Result<IngestReport, DecodeError> {
        let message = decode(&datagram.payload)?;
        Ok(self.apply(datagram.src.ip(), &message))
    }

    pub fn apply(&mut self, source: IpAddr, message: &DnsMessage) -> IngestReport {
        let mut report = IngestReport {
            records: message.records.len(),
            ..Default::default()
        };
        tracing::trace!(
            %source,
            response = message.is_response,
            questions = message.questions.len(),
            records = message.records.len(),
            "applying message"
        );

        for question in &message.questions {
            if let Some(query) = service_query(source, question) {
                if self.state.record_query(query) {
                    tracing::debug!(%source, query = %question.name, "new service query");
                    report.new_queries += 1;
                }
            }
        }

        // Known answers in queries are trusted too; a wrong one is
        // overwritten by the next real answer.
        for record in &message.records {
            tracing::debug!(kind = record.data.kind(), name = %record.name, "got record");

            match classify(record) {
                Action::NewInstance(name) => {
                    if self.state.add_instance(name) {
                        report.new_instances += 1;
                    }
                }
                Action::Enrich(deferred) => match self.state.defer(deferred) {
                    Queued::Replaced => {
                        tracing::trace!(name = %record.name, "replaced pending record");
                        report.replaced += 1;
                    }
                    Queued::Added | Queued::Evicted => report.deferred += 1,
                },
                Action::HostAddress { name, addr } => {
                    if self.state.set_host_address(&name, addr) {
                        report.host_updates += 1;
                    }
                }
                Action::Ignore(reason) => {
                    tracing::trace!(?reason, name = %record.name, "ignoring record");
                }
            }
        }

        report.resolved = self.state.drain_deferred();
        if !self.state.deferred().is_empty() {
            tracing::trace!(pending = self.state.deferred().len(), "records still waiting for PTR");
        }
        report
    }
}
