use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::net::IpAddr;
use chrono::Utc;
use shared::types::{DiscoverySnapshot, Host, ServiceInstance, ServiceQuery};
use crate::discovery::classify::InstanceName;
use crate::discovery::deferred::{DeferredQueue, DeferredRecord, Queued};

/// Insertion-ordered collection with one canonical entry per key. Entries
/// are never removed.
#[derive(Debug)]
pub struct Keyed<K, T> {
    entries: Vec<T>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash, T> Default for Keyed<K, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, T> Keyed<K, T> {
    /// Return the entry for `key`, creating it with `factory` if absent. The
    /// flag is true when the entry was created.
    pub fn upsert_if_absent(&mut self, key: K, factory: impl FnOnce() -> T) -> (&mut T, bool) {
        let (idx, created) = match self.index.get(&key) {
            Some(&idx) => (idx, false),
            None => {
                let idx = self.entries.len();
                self.entries.push(factory());
                self.index.insert(key, idx);
                (idx, true)
            }
        };
        (&mut self.entries[idx], created)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.get(key) {
            Some(&idx) => Some(&mut self.entries[idx]),
            None => None,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }
}

/// The mutable discovery model: service instances, hosts, observed service
/// queries and the deferred SRV/TXT queue.
#[derive(Debug, Default)]
pub struct DiscoveryState {
    instances: Keyed<String, ServiceInstance>,
    hosts: Keyed<String, Host>,
    queries: Keyed<(IpAddr, String), ServiceQuery>,
    deferred: DeferredQueue,
}

impl DiscoveryState {
    pub fn new(deferred_limit: Option<usize>) -> Self {
        Self {
            deferred: DeferredQueue::new(deferred_limit),
            ..Default::default()
        }
    }

    pub fn instances(&self) -> &[ServiceInstance] {
        self.instances.as_slice()
    }

    pub fn instance(&self, raw_name: &str) -> Option<&ServiceInstance> {
        self.instances.get(raw_name)
    }

    pub fn hosts(&self) -> &[Host] {
        self.hosts.as_slice()
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    /// Create the instance unless one with the same raw name exists. An
    /// existing instance is left untouched. Returns true if created.
    pub fn add_instance(&mut self, name: InstanceName) -> bool {
        let key = name.raw_name.clone();
        let (_, created) = self.instances.upsert_if_absent(key, || ServiceInstance {
            instance_name: name.instance_name,
            service_type: name.service_type,
            domain: name.domain,
            host: None,
            port: None,
            extras: None,
            raw_name: name.raw_name,
            first_seen: Utc::now(),
        });
        created
    }

    /// Set one of the host's addresses, creating the host if needed. Returns
    /// true if anything changed.
    pub fn set_host_address(&mut self, name: &str, addr: IpAddr) -> bool {
        let (host, created) = self.hosts.upsert_if_absent(name.to_string(), || Host {
            name: name.to_string(),
            ipv4_addr: None,
            ipv6_addr: None,
            first_seen: Utc::now(),
        });

        let changed = match addr {
            IpAddr::V4(v4) => host.ipv4_addr.replace(v4) != Some(v4),
            IpAddr::V6(v6) => host.ipv6_addr.replace(v6) != Some(v6),
        };
        created || changed
    }

    /// Insert a fully formed host, e.g. this machine. Existing hosts win.
    pub fn seed_host(&mut self, host: Host) -> bool {
        let key = host.name.clone();
        let (_, created) = self.hosts.upsert_if_absent(key, || host);
        created
    }

    /// Remember a service query. Returns true if it was not known yet.
    pub fn record_query(&mut self, query: ServiceQuery) -> bool {
        let key = (query.source_addr, query.raw_query.clone());
        let (_, created) = self.queries.upsert_if_absent(key, || query);
        created
    }

    pub fn defer(&mut self, record: DeferredRecord) -> Queued {
        self.deferred.push(record)
    }

    /// Apply every deferred record whose instance is now known and drop it
    /// from the queue. Returns the number of records applied.
    pub fn drain_deferred(&mut self) -> usize {
        let instances = &mut self.instances;
        self.deferred.resolve(|record| match instances.get_mut(record.owner.as_str()) {
            Some(instance) => {
                record.enrichment.apply_to(instance);
                true
            }
            None => false,
        })
    }

    /// Service queries sent from either address of `host_name`, one per raw
    /// query.
    pub fn queries_for_host(&self, host_name: &str) -> Vec<ServiceQuery> {
        let Some(host) = self.host(host_name) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        self.queries
            .as_slice()
            .iter()
            .filter(|q| host.has_address(q.source_addr))
            .filter(|q| seen.insert(q.raw_query.clone()))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> DiscoverySnapshot {
        DiscoverySnapshot {
            instances: self.instances.as_slice().to_vec(),
            hosts: self.hosts.as_slice().to_vec(),
            queries: self.queries.as_slice().to_vec(),
            pending_records: self.deferred.len(),
            taken_at: Utc::now(),
        }
    }
}
