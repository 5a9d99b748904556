//! Peer handling
//!
//! Each remote address the router hears from gets a `Peer`: the outbound
//! path with its coalescing send buffer, plus activity timestamps and
//! traffic counters.

use bytes::{BufMut, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

/// Peer errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {size} bytes exceeds peer buffer capacity {capacity}")]
    FrameTooLarge { size: usize, capacity: usize },
}

pub type PeerResult<T> = Result<T, PeerError>;

/// Peer traffic counters
#[derive(Debug, Default, Clone, Copy)]
pub struct PeerStats {
    /// Datagrams transmitted to the peer
    pub datagrams_sent: u64,
    /// Bytes transmitted to the peer
    pub bytes_sent: u64,
    /// Datagrams received from the peer
    pub datagrams_received: u64,
    /// Bytes received from the peer
    pub bytes_received: u64,
}

/// A remote endpoint's outbound path
///
/// Frames pushed with `send` accumulate in a fixed-capacity buffer sized to
/// the router's maximum datagram size, so several small frames leave as one
/// physical packet. The buffer flushes when a frame would overflow it, when
/// it fills exactly, or on an explicit `flush`. The buffer is guarded by an
/// internal mutex; concurrent senders serialize rather than race.
pub struct Peer {
    /// Remote peer address
    addr: SocketAddr,
    /// The shared listening socket, used for transmission
    socket: Arc<UdpSocket>,
    /// Send buffer capacity; equals the router's maximum datagram size
    capacity: usize,
    /// Accumulating send buffer
    outbound: Mutex<BytesMut>,
    /// Last receive time, microseconds since the Unix epoch
    last_recv_us: AtomicU64,
    /// Last send time, microseconds since the Unix epoch
    last_send_us: AtomicU64,
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
    datagrams_received: AtomicU64,
    bytes_received: AtomicU64,
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

impl Peer {
    /// Create a peer for a remote address, transmitting over `socket`
    pub(crate) fn new(addr: SocketAddr, socket: Arc<UdpSocket>, capacity: usize) -> Self {
        let now = now_micros();
        Self {
            addr,
            socket,
            capacity,
            outbound: Mutex::new(BytesMut::with_capacity(capacity)),
            last_recv_us: AtomicU64::new(now),
            last_send_us: AtomicU64::new(now),
            datagrams_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            datagrams_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// The remote address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The send buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stamp the last-receive time to now
    pub fn update_recv_time(&self) {
        self.last_recv_us.store(now_micros(), Ordering::Relaxed);
    }

    /// Stamp the last-receive time and count an inbound datagram
    pub(crate) fn record_received(&self, bytes: usize) {
        self.update_recv_time();
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Time of the last received datagram
    pub fn last_recv(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(self.last_recv_us.load(Ordering::Relaxed))
    }

    /// Time of the last transmitted datagram
    pub fn last_send(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(self.last_send_us.load(Ordering::Relaxed))
    }

    /// Time since the last received datagram
    ///
    /// The router enforces no timeout; idle policies are the application's,
    /// driven off this value.
    pub fn idle_time(&self) -> Duration {
        let last = self.last_recv_us.load(Ordering::Relaxed);
        Duration::from_micros(now_micros().saturating_sub(last))
    }

    /// Snapshot of the traffic counters
    pub fn stats(&self) -> PeerStats {
        PeerStats {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    /// Queue a frame for transmission, coalescing with earlier frames
    ///
    /// Flushes first when the frame would overflow the buffer, and
    /// immediately after appending when the buffer is exactly full, so no
    /// packet ever exceeds the configured maximum size.
    pub async fn send(&self, frame: &[u8]) -> PeerResult<()> {
        if frame.len() > self.capacity {
            return Err(PeerError::FrameTooLarge {
                size: frame.len(),
                capacity: self.capacity,
            });
        }

        let mut buf = self.outbound.lock().await;
        if buf.len() + frame.len() > self.capacity {
            self.flush_buffer(&mut buf).await?;
        }
        buf.put_slice(frame);
        if buf.len() >= self.capacity {
            self.flush_buffer(&mut buf).await?;
        }
        Ok(())
    }

    /// Transmit any buffered bytes as a single datagram, regardless of fill
    pub async fn flush(&self) -> PeerResult<()> {
        let mut buf = self.outbound.lock().await;
        self.flush_buffer(&mut buf).await
    }

    /// Transmit and clear the buffer; cleared even when transmission fails
    async fn flush_buffer(&self, buf: &mut BytesMut) -> PeerResult<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let result = self.transmit(buf).await;
        buf.clear();
        result
    }

    /// Send one datagram, retrying partial writes until fully sent
    async fn transmit(&self, data: &[u8]) -> PeerResult<()> {
        let mut sent = 0;
        while sent < data.len() {
            sent += self.socket.send_to(&data[sent..], self.addr).await?;
        }
        self.last_send_us.store(now_micros(), Ordering::Relaxed);
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn peer_with_receiver(capacity: usize) -> (Peer, UdpSocket) {
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = Peer::new(receiver.local_addr().unwrap(), sender, capacity);
        (peer, receiver)
    }

    async fn recv_packet(receiver: &UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 256];
        let len = timeout(Duration::from_secs(1), receiver.recv(&mut buf))
            .await
            .expect("timed out waiting for packet")
            .unwrap();
        buf[..len].to_vec()
    }

    #[tokio::test]
    async fn test_small_frames_coalesce_into_one_packet() {
        let (peer, receiver) = peer_with_receiver(64).await;

        peer.send(&[1, 1, 1, 1]).await.unwrap();
        peer.send(&[2, 2, 2, 2]).await.unwrap();
        peer.send(&[3, 3, 3, 3]).await.unwrap();
        peer.flush().await.unwrap();

        let packet = recv_packet(&receiver).await;
        assert_eq!(packet, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
    }

    #[tokio::test]
    async fn test_overflow_splits_into_two_packets() {
        let (peer, receiver) = peer_with_receiver(20).await;

        // First 12-byte frame fits; the second would overflow 20, so the
        // first flushes alone and the second leaves on the explicit flush.
        peer.send(&[0xAA; 12]).await.unwrap();
        peer.send(&[0xBB; 12]).await.unwrap();
        peer.flush().await.unwrap();

        assert_eq!(recv_packet(&receiver).await, vec![0xAA; 12]);
        assert_eq!(recv_packet(&receiver).await, vec![0xBB; 12]);
    }

    #[tokio::test]
    async fn test_exact_fill_flushes_immediately() {
        let (peer, receiver) = peer_with_receiver(16).await;

        peer.send(&[0xCC; 16]).await.unwrap();

        // No explicit flush; the full buffer left on its own
        assert_eq!(recv_packet(&receiver).await, vec![0xCC; 16]);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let (peer, _receiver) = peer_with_receiver(8).await;

        match peer.send(&[0u8; 9]).await {
            Err(PeerError::FrameTooLarge { size, capacity }) => {
                assert_eq!(size, 9);
                assert_eq!(capacity, 8);
            }
            other => panic!("expected FrameTooLarge, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_empty_flush_sends_nothing() {
        let (peer, receiver) = peer_with_receiver(16).await;

        peer.flush().await.unwrap();

        let mut buf = [0u8; 16];
        let result = timeout(Duration::from_millis(100), receiver.recv(&mut buf)).await;
        assert!(result.is_err(), "no packet should have been sent");
        assert_eq!(peer.stats().datagrams_sent, 0);
    }

    #[tokio::test]
    async fn test_stats_and_timestamps() {
        let (peer, receiver) = peer_with_receiver(16).await;
        let before = peer.last_send();

        peer.send(&[1, 2, 3]).await.unwrap();
        peer.flush().await.unwrap();
        recv_packet(&receiver).await;

        let stats = peer.stats();
        assert_eq!(stats.datagrams_sent, 1);
        assert_eq!(stats.bytes_sent, 3);
        assert!(peer.last_send() >= before);

        peer.record_received(10);
        let stats = peer.stats();
        assert_eq!(stats.datagrams_received, 1);
        assert_eq!(stats.bytes_received, 10);
        assert!(peer.idle_time() < Duration::from_secs(1));
    }
}
