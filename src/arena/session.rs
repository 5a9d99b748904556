//! Per-peer game loop
//!
//! Each connected peer gets its own session task: integrate the peer's
//! latest movement input into a player position on a fixed tick, clamp to
//! the playing field, and send the position status back. The session ends
//! when the peer stops sending for longer than the idle timeout; the peer
//! itself stays registered with the router.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::ArenaConfig;
use crate::network::{Peer, Router};
use crate::protocol::Status;

use super::wire::STATUS_POSITION;
use super::{Direction, Player};

/// One peer's game loop state
pub struct Session {
    router: Arc<Router>,
    peer: Arc<Peer>,
    config: ArenaConfig,
    movement: watch::Receiver<Direction>,
    player: Player,
}

/// One tick of position integration with field clamping
fn advance(player: Player, direction: Direction, config: &ArenaConfig) -> Player {
    Player {
        x: (player.x + direction.x * config.move_speed).clamp(-config.bounds_x, config.bounds_x),
        y: (player.y + direction.y * config.move_speed).clamp(-config.bounds_y, config.bounds_y),
    }
}

impl Session {
    pub fn new(
        router: Arc<Router>,
        peer: Arc<Peer>,
        config: ArenaConfig,
        movement: watch::Receiver<Direction>,
    ) -> Self {
        Self {
            router,
            peer,
            config,
            movement,
            player: Player::default(),
        }
    }

    /// Tick until the peer goes idle
    pub async fn run(mut self) {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        let idle_timeout = Duration::from_millis(self.config.idle_timeout_ms);

        loop {
            ticker.tick().await;
            if self.peer.idle_time() > idle_timeout {
                break;
            }

            let direction = *self.movement.borrow();
            self.player = advance(self.player, direction, &self.config);

            let status = Status::new(STATUS_POSITION, self.player);
            if let Err(e) = self
                .router
                .send(std::slice::from_ref(&self.peer), &[status])
                .await
            {
                tracing::warn!("Failed to send position to {}: {}", self.peer.addr(), e);
            }
        }

        let stats = self.peer.stats();
        tracing::info!(
            "Peer {} went idle; session ended ({} datagrams in, {} out)",
            self.peer.addr(),
            stats.datagrams_received,
            stats.datagrams_sent
        );
    }
}
