//! UDP router
//!
//! Owns the listening socket, the peer registry, and the translator and
//! generator registries. The dispatch loop reads one datagram at a time,
//! resolves the sending peer, decodes the datagram's operation records, and
//! hands each one to the event handler. Outbound state flows back through
//! `send`/`broadcast`, which encode statuses and coalesce them into the
//! target peers' buffers.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;

use super::peer::{Peer, PeerError};
use super::{resolve_listen_addr, RouterConfig};
use crate::protocol::{
    CodecError, Generator, Operation, Status, Translator, WireReader, WireWriter,
};

/// Router errors
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("no translator registered for operation type {0}")]
    UnknownOperation(u32),

    #[error("peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("bind failed: {0}")]
    BindFailed(String),
}

pub type RouterResult<T> = Result<T, RouterError>;

/// Failures collected across one `send`/`broadcast` fan-out
///
/// Individual generator or peer failures do not stop the remaining
/// statuses and peers; they accumulate here and come back as one value.
#[derive(Debug, Default)]
pub struct SendErrors {
    errors: Vec<RouterError>,
}

impl SendErrors {
    fn push(&mut self, error: RouterError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[RouterError] {
        &self.errors
    }

    fn into_result(self) -> Result<(), SendErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for SendErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        write!(f, "{}", joined)
    }
}

impl std::error::Error for SendErrors {}

/// Callback surface invoked from the dispatch task
///
/// Callbacks run sequentially on the single dispatch task; handlers that
/// need concurrency hand work off to their own tasks instead of blocking
/// here. The router reference lets handlers call back into
/// `send`/`broadcast` or keep an owned clone for spawned tasks.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// A datagram arrived from a previously unseen address
    ///
    /// The returned verdict is advisory; the router processes the datagram
    /// either way.
    async fn on_connect(&self, router: &Arc<Router>, peer: &Arc<Peer>) -> bool;

    /// A decoded operation arrived from a peer
    async fn on_operation(&self, router: &Arc<Router>, peer: &Arc<Peer>, op: Operation);

    /// Something went wrong reading or decoding; `peer` is absent for
    /// socket-level read failures
    async fn on_error(&self, router: &Arc<Router>, peer: Option<&Arc<Peer>>, error: RouterError);
}

/// UDP datagram router
pub struct Router {
    /// The listening socket, shared with every peer for transmission
    socket: Arc<UdpSocket>,
    /// Maximum datagram size; receive buffer and peer buffer capacity
    max_datagram_size: usize,
    /// Known peers by remote address
    peers: RwLock<HashMap<SocketAddr, Arc<Peer>>>,
    /// Operation decoders by type tag; unmapped inbound tags are errors
    translators: HashMap<u32, Box<dyn Translator>>,
    /// Status encoders by type tag; unmapped outbound tags are dropped
    generators: HashMap<u32, Box<dyn Generator>>,
    /// Event callbacks
    events: Box<dyn EventHandler>,
}

impl Router {
    /// Bind the listening socket and create a router
    pub async fn bind(config: RouterConfig, events: Box<dyn EventHandler>) -> RouterResult<Self> {
        if config.max_datagram_size == 0 {
            return Err(RouterError::InvalidConfig(
                "max_datagram_size must be positive".to_string(),
            ));
        }

        let addr = resolve_listen_addr(&config.listen).await.map_err(|e| {
            RouterError::BindFailed(format!("could not resolve {}: {}", config.listen, e))
        })?;
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| RouterError::BindFailed(format!("could not bind {}: {}", addr, e)))?;

        tracing::info!("Router listening on {}", socket.local_addr()?);

        Ok(Self {
            socket: Arc::new(socket),
            max_datagram_size: config.max_datagram_size,
            peers: RwLock::new(HashMap::new()),
            translators: HashMap::new(),
            generators: HashMap::new(),
            events,
        })
    }

    /// The bound local address
    pub fn local_addr(&self) -> RouterResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// The configured maximum datagram size
    pub fn max_datagram_size(&self) -> usize {
        self.max_datagram_size
    }

    /// Register an operation translator under its declared type tag
    ///
    /// A later registration for the same tag replaces the earlier one.
    pub fn add_translator(&mut self, translator: Box<dyn Translator>) {
        self.translators.insert(translator.op_type(), translator);
    }

    /// Register a status generator under its declared type tag
    pub fn add_generator(&mut self, generator: Box<dyn Generator>) {
        self.generators.insert(generator.status_type(), generator);
    }

    /// Look up a peer by remote address
    pub async fn peer(&self, addr: SocketAddr) -> Option<Arc<Peer>> {
        self.peers.read().await.get(&addr).cloned()
    }

    /// Snapshot of all currently known peers
    pub async fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Receive and dispatch datagrams, one at a time, forever
    ///
    /// Read and decode failures are reported through the event handler and
    /// never end the loop; cancellation is the caller's concern (drop the
    /// task or select against a shutdown signal). Consumes the `Arc` handle;
    /// clone first to keep one.
    pub async fn run(self: Arc<Self>) {
        let mut buf = vec![0u8; self.max_datagram_size];
        loop {
            let (len, addr) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    self.events.on_error(&self, None, RouterError::Io(e)).await;
                    continue;
                }
            };

            let peer = resolve_peer(&self, addr).await;
            peer.record_received(len);
            dispatch_datagram(&self, &peer, &buf[..len]).await;
        }
    }

    /// Encode statuses and deliver them to the given peers
    ///
    /// Statuses are processed in caller order; each one is encoded once and
    /// pushed to every target peer's buffer, then every peer is flushed
    /// exactly once. A status without a registered generator is dropped
    /// silently. Individual failures accumulate into the returned
    /// `SendErrors` without stopping the fan-out.
    pub async fn send(&self, peers: &[Arc<Peer>], statuses: &[Status]) -> Result<(), SendErrors> {
        let mut errors = SendErrors::default();

        for status in statuses {
            let Some(generator) = self.generators.get(&status.status_type()) else {
                continue;
            };
            let payload = match generator.generate(status.value()) {
                Ok(payload) => payload,
                Err(e) => {
                    errors.push(e.into());
                    continue;
                }
            };

            let mut writer = WireWriter::with_capacity(4 + payload.len());
            writer.write_u32(status.status_type());
            writer.write_bytes(&payload);

            for peer in peers {
                if let Err(e) = peer.send(writer.buffer()).await {
                    errors.push(e.into());
                }
            }
        }

        for peer in peers {
            if let Err(e) = peer.flush().await {
                errors.push(e.into());
            }
        }

        errors.into_result()
    }

    /// Deliver statuses to every currently known peer
    pub async fn broadcast(&self, statuses: &[Status]) -> Result<(), SendErrors> {
        let peers = self.peers().await;
        self.send(&peers, statuses).await
    }
}

/// Find the peer for an address, registering a new one on first contact
///
/// Only the dispatch task inserts peers, so the read-then-write sequence
/// cannot race with itself.
async fn resolve_peer(router: &Arc<Router>, addr: SocketAddr) -> Arc<Peer> {
    if let Some(peer) = router.peers.read().await.get(&addr) {
        return peer.clone();
    }

    let peer = Arc::new(Peer::new(
        addr,
        router.socket.clone(),
        router.max_datagram_size,
    ));
    router.peers.write().await.insert(addr, peer.clone());
    tracing::debug!("New peer {}", addr);
    // Advisory verdict; the datagram is processed either way.
    let _ = router.events.on_connect(router, &peer).await;
    peer
}

/// Decode a datagram's back-to-back operation records
///
/// The first failure reports through the event handler and abandons the
/// rest of the datagram; operations already handed out stay handed out.
async fn dispatch_datagram(router: &Arc<Router>, peer: &Arc<Peer>, datagram: &[u8]) {
    let mut reader = WireReader::new(datagram);
    while reader.remaining() > 0 {
        let op_type = match reader.read_u32() {
            Ok(tag) => tag,
            Err(e) => {
                router.events.on_error(router, Some(peer), e.into()).await;
                break;
            }
        };

        let Some(translator) = router.translators.get(&op_type) else {
            router
                .events
                .on_error(router, Some(peer), RouterError::UnknownOperation(op_type))
                .await;
            break;
        };

        match translator.translate(reader.buffer()) {
            Ok((consumed, value)) => {
                reader.seek(consumed as isize);
                router
                    .events
                    .on_operation(router, peer, Operation::new(op_type, value))
                    .await;
            }
            Err(e) => {
                router.events.on_error(router, Some(peer), e.into()).await;
                break;
            }
        }
    }
}
