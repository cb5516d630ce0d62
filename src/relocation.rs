//! Post-round relocation policy

use crate::config::GameConfig;
use crate::session::Participant;
use crate::types::{Outcome, Position};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Where players go once a round is over, or when they leave with a transfer.
///
/// The arena calls this after its own reset, so nothing done here can race
/// the next round's joins.
pub trait Relocator: Send + Sync {
    fn relocate(&self, players: Vec<Participant>, outcome: Outcome);

    fn send_to_hub(&self, player: &Participant);
}

/// Leaves players where they are.
#[derive(Debug, Default, Clone, Copy)]
pub struct StayPut;

impl Relocator for StayPut {
    fn relocate(&self, _players: Vec<Participant>, _outcome: Outcome) {}

    fn send_to_hub(&self, _player: &Participant) {}
}

/// Teleport everyone to the lobby, then hand them to the hub one at a time
/// (or kick them if hub transfer is off). Player `i` goes after
/// `transfer-delay + i * staggered-transfer-delay` seconds.
pub struct StaggeredRelocator {
    config: Arc<GameConfig>,
    lobby: Option<(String, Position)>,
}

impl StaggeredRelocator {
    pub fn new(config: Arc<GameConfig>) -> Self {
        Self { config, lobby: None }
    }

    pub fn lobby(mut self, world: impl Into<String>, spawn: Position) -> Self {
        self.lobby = Some((world.into(), spawn));
        self
    }

    fn delay_for(&self, index: u64) -> Duration {
        let hub = &self.config.hub_server;
        Duration::from_secs(hub.transfer_delay + index * hub.staggered_transfer_delay)
    }
}

/// Run `f` after `delay` on the current runtime; immediately without one.
fn dispatch(delay: Duration, f: impl FnOnce() + Send + 'static) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if !delay.is_zero() => {
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                f();
            });
        }
        _ => f(),
    }
}

impl Relocator for StaggeredRelocator {
    fn relocate(&self, players: Vec<Participant>, outcome: Outcome) {
        if players.is_empty() {
            return;
        }
        let end = &self.config.game_end;

        if end.send_to_spawn {
            if let Some((world, spawn)) = &self.lobby {
                for p in players.iter().filter(|p| p.is_online()) {
                    p.teleport(world, *spawn);
                    p.send_message("Returning to spawn...");
                }
            }
        }

        if end.transfer_to_hub {
            if !self.config.hub_server.enabled {
                return;
            }
            if !self.config.hub_available() {
                warn!("Hub transfer failed: no address configured");
                return;
            }
        }

        debug!("Relocating {} players ({})", players.len(), outcome.as_str());
        let online = players.into_iter().filter(|p| p.is_online());
        for (i, player) in online.enumerate() {
            let delay = self.delay_for(i as u64);
            if end.transfer_to_hub {
                let hub = self.config.hub_server.clone();
                dispatch(delay, move || {
                    if player.is_online() && !player.transfer(&hub.address, hub.port, &hub.transfer_message) {
                        warn!("Transfer of {} to {}:{} refused", player.name(), hub.address, hub.port);
                    }
                });
            } else {
                let message = end.kick_message.clone();
                dispatch(delay, move || {
                    if player.is_online() {
                        player.kick(&message);
                    }
                });
            }
        }
    }

    fn send_to_hub(&self, player: &Participant) {
        if !self.config.hub_available() {
            warn!("Hub transfer for {} skipped: hub not configured", player.name());
            return;
        }
        let hub = &self.config.hub_server;
        if !player.transfer(&hub.address, hub.port, "Returning to hub...") {
            warn!("Transfer of {} to {}:{} refused", player.name(), hub.address, hub.port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::sim::SimPlayer;

    #[test]
    fn test_kick_policy_without_runtime_runs_immediately() {
        let mut config = GameConfig::default();
        config.game_end.transfer_to_hub = false;
        let relocator = StaggeredRelocator::new(Arc::new(config)).lobby("lobby", Position::new(0.0, 70.0, 0.0));

        let a = SimPlayer::new("a");
        let b = SimPlayer::new("b");
        b.set_online(false);
        relocator.relocate(vec![a.handle(), b.handle()], Outcome::GameEnd);

        assert_eq!(a.world_name().as_deref(), Some("lobby"));
        assert!(a.kicked().is_some());
        assert!(b.kicked().is_none());
    }

    #[test]
    fn test_hub_without_address_does_nothing() {
        let relocator = StaggeredRelocator::new(Arc::new(GameConfig::default()));
        let a = SimPlayer::new("a");
        relocator.relocate(vec![a.handle()], Outcome::GameWon);
        assert!(a.transfers().is_empty());
        assert!(a.kicked().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfers_are_staggered() {
        let config = GameConfig::default().hub("hub.local", 19132);
        let relocator = StaggeredRelocator::new(Arc::new(config));
        let a = SimPlayer::new("a");
        let b = SimPlayer::new("b");
        relocator.relocate(vec![a.handle(), b.handle()], Outcome::GameWon);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(a.transfers().len(), 1);
        assert!(b.transfers().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(b.transfers(), vec![("hub.local".to_string(), 19132)]);
    }
}
