//! Network module - UDP datagram routing between peers
//!
//! Provides:
//! - Router owning the listening socket and the dispatch loop
//! - Peer abstraction with per-address send coalescing
//! - Event callbacks for connects, decoded operations, and errors

mod peer;
mod router;

pub use peer::*;
pub use router::*;

use std::io;
use std::net::SocketAddr;

use crate::protocol::{DEFAULT_DATAGRAM_SIZE, DEFAULT_PORT};

/// Configuration for a router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Address to listen on, as a `host:port` string
    pub listen: String,
    /// Maximum datagram size; also every peer's send buffer capacity
    pub max_datagram_size: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listen: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_datagram_size: DEFAULT_DATAGRAM_SIZE,
        }
    }
}

impl RouterConfig {
    pub fn new(listen: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            ..Default::default()
        }
    }

    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }
}

/// Resolve a `host:port` listen string to a socket address
///
/// A bare `:port` form binds all interfaces.
pub async fn resolve_listen_addr(listen: &str) -> io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let target = if listen.starts_with(':') {
        format!("0.0.0.0{}", listen)
    } else {
        listen.to_string()
    };

    let mut addrs = lookup_host(&target).await?;
    addrs.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("could not resolve listen address: {}", listen),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_listen_addr() {
        let addr = resolve_listen_addr("127.0.0.1:10086").await.unwrap();
        assert_eq!(addr.port(), 10086);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_resolve_bare_port() {
        let addr = resolve_listen_addr(":9000").await.unwrap();
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn test_default_config() {
        let config = RouterConfig::default();
        assert_eq!(config.max_datagram_size, DEFAULT_DATAGRAM_SIZE);
        assert!(config.listen.ends_with(&DEFAULT_PORT.to_string()));
    }
}
