use shared::types::ServiceInstance;

/// Data carried by an SRV or TXT record, to be merged into the instance named
/// by the record's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    Srv { target: String, port: u16 },
    Txt(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentKind {
    Srv,
    Txt,
}

impl Enrichment {
    pub fn kind(&self) -> EnrichmentKind {
        match self {
            Enrichment::Srv { .. } => EnrichmentKind::Srv,
            Enrichment::Txt(_) => EnrichmentKind::Txt,
        }
    }

    /// SRV sets host and port, TXT replaces the extras wholesale.
    pub fn apply_to(&self, instance: &mut ServiceInstance) {
        match self {
            Enrichment::Srv { target, port } => {
                instance.host = Some(target.clone());
                instance.port = Some(*port);
            }
            Enrichment::Txt(strings) => {
                instance.extras = Some(strings.clone());
            }
        }
    }
}

/// An SRV or TXT record waiting for the PTR that defines its instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredRecord {
    /// Owner name of the record, i.e. the Service Instance Name
    pub owner: String,
    pub enrichment: Enrichment,
}

/// Outcome of queueing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queued {
    /// Appended at the back of the queue
    Added,
    /// A record of the same kind for the same owner was waiting; its payload
    /// was replaced in place
    Replaced,
    /// Appended after evicting the oldest entry to stay within the limit
    Evicted,
}

/// Insertion-ordered buffer of enrichment records not yet matched to an
/// instance.
///
/// At most one entry per (owner, kind): a pending SRV and a pending TXT for
/// the same owner coexist. Entries leave the queue only when resolved, or
/// when a configured limit forces out the oldest one.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    records: Vec<DeferredRecord>,
    limit: Option<usize>,
}

impl DeferredQueue {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            records: Vec::new(),
            limit: limit.map(|l| l.max(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: DeferredRecord) -> Queued {
        let kind = record.enrichment.kind();
        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.owner == record.owner && r.enrichment.kind() == kind)
        {
            existing.enrichment = record.enrichment;
            return Queued::Replaced;
        }

        let mut outcome = Queued::Added;
        if let Some(limit) = self.limit {
            while self.records.len() >= limit {
                let dropped = self.remove_at(0);
                tracing::warn!(
                    owner = %dropped.owner,
                    limit,
                    "deferred queue full, dropping oldest record"
                );
                outcome = Queued::Evicted;
            }
        }
        self.records.push(record);
        outcome
    }

    /// Remove the entry at `index`, keeping the order of the rest.
    pub fn remove_at(&mut self, index: usize) -> DeferredRecord {
        self.records.remove(index)
    }

    /// One pass over the queue in insertion order. Every record for which
    /// `apply` returns true is removed once the pass is complete; the others
    /// stay for the next pass. Returns the number of records removed.
    pub fn resolve<F>(&mut self, mut apply: F) -> usize
    where
        F: FnMut(&DeferredRecord) -> bool,
    {
        let resolved: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| apply(record).then_some(idx))
            .collect();

        for &idx in resolved.iter().rev() {
            self.remove_at(idx);
        }
        resolved.len()
    }
}
