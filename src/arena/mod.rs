//! Arena module - the demo application driving the router
//!
//! A minimal position-sync service: peers send movement operations, the
//! arena integrates them into a per-peer player position on a fixed tick
//! and streams the position back as a status. One session task per peer,
//! created on connect and torn down when the peer goes idle.

mod session;
mod wire;

pub use session::*;
pub use wire::*;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};

use crate::config::ArenaConfig;
use crate::network::{EventHandler, Peer, Router, RouterError};
use crate::protocol::Operation;

/// A player's position on the field
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Player {
    pub x: f32,
    pub y: f32,
}

/// A movement input vector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Direction {
    pub x: f32,
    pub y: f32,
}

/// Event handler wiring peers to arena sessions
///
/// Session state lives per connection: connect spawns the session task and
/// a movement channel; movement operations publish into the channel; the
/// session removes its own entry when it ends.
pub struct ArenaEvents {
    config: ArenaConfig,
    sessions: Arc<RwLock<HashMap<SocketAddr, watch::Sender<Direction>>>>,
}

impl ArenaEvents {
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl EventHandler for ArenaEvents {
    async fn on_connect(&self, router: &Arc<Router>, peer: &Arc<Peer>) -> bool {
        tracing::info!("Peer connected: {}", peer.addr());

        let (tx, rx) = watch::channel(Direction::default());
        self.sessions.write().await.insert(peer.addr(), tx);

        let session = Session::new(router.clone(), peer.clone(), self.config.clone(), rx);
        let sessions = self.sessions.clone();
        let addr = peer.addr();
        tokio::spawn(async move {
            session.run().await;
            sessions.write().await.remove(&addr);
        });

        true
    }

    async fn on_operation(&self, _router: &Arc<Router>, peer: &Arc<Peer>, op: Operation) {
        if op.op_type() == OP_MOVE {
            if let Some(direction) = op.downcast_ref::<Direction>() {
                if let Some(tx) = self.sessions.read().await.get(&peer.addr()) {
                    let _ = tx.send(*direction);
                }
            }
        }
    }

    async fn on_error(&self, _router: &Arc<Router>, peer: Option<&Arc<Peer>>, error: RouterError) {
        match peer {
            Some(peer) => tracing::warn!("Peer {} error: {}", peer.addr(), error),
            None => tracing::warn!("Socket error: {}", error),
        }
    }
}
