use std::thread;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::{DiscoverySnapshot, ServiceInstance, ServiceQuery};
use crate::capture::CapturedDatagram;
use crate::discovery::hash;
use crate::discovery::reconcile::Reconciler;
use crate::discovery::state::DiscoveryState;

/// Commands sent to the state thread
pub enum StateCommand {
    Ingest(CapturedDatagram),
    Snapshot(oneshot::Sender<DiscoverySnapshot>),
    Instance(String, oneshot::Sender<Option<ServiceInstance>>),
    QueriesForHost(String, oneshot::Sender<Vec<ServiceQuery>>),
    Shutdown,
}

/// Handle to the thread that owns the discovery state. The thread is the only
/// writer; readers get copies.
#[derive(Clone)]
pub struct StateHandle {
    tx: mpsc::Sender<StateCommand>,
}

impl StateHandle {
    /// Spawn the state thread around `state`
    pub fn spawn(state: DiscoveryState, hash_tx: watch::Sender<String>) -> Self {
        let (tx, mut rx) = mpsc::channel::<StateCommand>(256);

        let publish_hash = |reconciler: &Reconciler, hash_tx: &watch::Sender<String>| {
            let state = reconciler.state();
            let new_hash = hash::compute_hash(state.instances(), state.hosts());
            hash_tx.send_if_modified(|current| {
                if *current == new_hash {
                    return false;
                }
                *current = new_hash;
                true
            });
        };

        thread::spawn(move || {
            let mut reconciler = Reconciler::new(state);
            publish_hash(&reconciler, &hash_tx);

            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    StateCommand::Ingest(datagram) => match reconciler.ingest(&datagram) {
                        Ok(report) => {
                            tracing::trace!(src = %datagram.src, local = %datagram.local, ?report, "ingested packet");
                            if report.changed() {
                                publish_hash(&reconciler, &hash_tx);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(src = %datagram.src, error = %e, "dropping malformed packet");
                        }
                    },
                    StateCommand::Snapshot(reply) => {
                        let _ = reply.send(reconciler.state().snapshot());
                    }
                    StateCommand::Instance(raw_name, reply) => {
                        let _ = reply.send(reconciler.state().instance(&raw_name).cloned());
                    }
                    StateCommand::QueriesForHost(host_name, reply) => {
                        let _ = reply.send(reconciler.state().queries_for_host(&host_name));
                    }
                    StateCommand::Shutdown => {
                        tracing::info!("State thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Queue a datagram for reconciliation
    pub async fn ingest(&self, datagram: CapturedDatagram) -> Result<()> {
        self.tx.send(StateCommand::Ingest(datagram)).await?;
        Ok(())
    }

    /// Copy of the current instances and hosts
    pub async fn snapshot(&self) -> Result<DiscoverySnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StateCommand::Snapshot(reply)).await?;
        Ok(rx.await?)
    }

    /// A single instance by its full Service Instance Name
    pub async fn instance(&self, raw_name: String) -> Result<Option<ServiceInstance>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StateCommand::Instance(raw_name, reply)).await?;
        Ok(rx.await?)
    }

    /// Service queries issued from the addresses of a host
    pub async fn queries_for_host(&self, host_name: String) -> Result<Vec<ServiceQuery>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(StateCommand::QueriesForHost(host_name, reply)).await?;
        Ok(rx.await?)
    }

    /// Shutdown the state thread
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(StateCommand::Shutdown).await?;
        Ok(())
    }
}

/// Packet consumer: hands captured datagrams to the state thread in arrival
/// order until cancelled or the capture side closes the channel.
pub async fn run(
    state: StateHandle,
    mut rx: mpsc::Receiver<CapturedDatagram>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            datagram = rx.recv() => {
                match datagram {
                    Some(datagram) => state.ingest(datagram).await?,
                    None => {
                        tracing::info!("Capture channel closed");
                        break;
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Packet consumer shutting down");
                break;
            }
        }
    }

    Ok(())
}
