//! Runner abilities: the speed feather and the PVP jump boost

use crate::config::GameConfig;
use crate::session::Participant;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Result of trying to use an ability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityUse {
    Used,
    /// Still cooling down for this long
    Cooldown(Duration),
    /// Not usable right now (not running, or PVP not active for jump)
    Unavailable,
}

/// Per-player cooldowns
#[derive(Debug)]
pub struct Abilities {
    config: Arc<GameConfig>,
    speed: HashMap<String, Instant>,
    jump: HashMap<String, Instant>,
}

impl Abilities {
    pub fn new(config: Arc<GameConfig>) -> Self {
        Self {
            config,
            speed: HashMap::new(),
            jump: HashMap::new(),
        }
    }

    fn speed_cooldown(&self) -> Duration {
        Duration::from_secs(self.config.speed_boost.cooldown_seconds)
    }

    fn jump_cooldown(&self) -> Duration {
        Duration::from_secs(self.config.jump_boost.cooldown_minutes * 60)
    }

    /// Speed boost from the feather.
    pub fn use_speed(&mut self, player: &Participant) -> AbilityUse {
        let cooldown = self.speed_cooldown();
        if let Some(left) = remaining(&self.speed, player.name(), cooldown) {
            player.send_message(&format!("Speed boost on cooldown! {}s remaining", left.as_secs().max(1)));
            return AbilityUse::Cooldown(left);
        }

        let secs = self.config.speed_boost.duration_seconds;
        player.apply_speed(secs, 1);
        player.send_message(&format!("Speed boost activated for {secs} seconds!"));
        self.speed.insert(player.name().to_string(), Instant::now());
        debug!("{} used speed boost", player.name());
        AbilityUse::Used
    }

    /// Upward launch; only while PVP is on.
    pub fn use_jump(&mut self, player: &Participant, pvp_enabled: bool) -> AbilityUse {
        if !pvp_enabled {
            player.send_message("Jump boost is only available in PVP mode!");
            return AbilityUse::Unavailable;
        }
        let cooldown = self.jump_cooldown();
        if let Some(left) = remaining(&self.jump, player.name(), cooldown) {
            player.send_message(&format!("Jump boost on cooldown! {}s remaining", left.as_secs().max(1)));
            return AbilityUse::Cooldown(left);
        }

        player.launch(self.config.jump_boost.launch_height);
        player.send_message("Jump boost!");
        self.jump.insert(player.name().to_string(), Instant::now());
        debug!("{} used jump boost", player.name());
        AbilityUse::Used
    }

    pub fn forget(&mut self, name: &str) {
        self.speed.remove(name);
        self.jump.remove(name);
    }
}

fn remaining(used: &HashMap<String, Instant>, name: &str, cooldown: Duration) -> Option<Duration> {
    let since = used.get(name)?.elapsed();
    (since < cooldown).then(|| cooldown - since)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::sim::SimPlayer;

    fn abilities() -> Abilities {
        Abilities::new(Arc::new(GameConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_boost_cooldown() {
        let mut abilities = abilities();
        let p = SimPlayer::new("runner");
        let handle = p.handle();

        assert_eq!(abilities.use_speed(&handle), AbilityUse::Used);
        assert_eq!(p.speed(), Some((7, 1)));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(abilities.use_speed(&handle), AbilityUse::Cooldown(Duration::from_secs(15)));
        assert!(p.heard("15s remaining"));

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(abilities.use_speed(&handle), AbilityUse::Used);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jump_needs_pvp_and_launches() {
        let mut abilities = abilities();
        let p = SimPlayer::new("runner");
        let handle = p.handle();

        assert_eq!(abilities.use_jump(&handle, false), AbilityUse::Unavailable);
        assert_eq!(abilities.use_jump(&handle, true), AbilityUse::Used);
        assert_eq!(p.position().y, 8.0);
        assert!(matches!(abilities.use_jump(&handle, true), AbilityUse::Cooldown(_)));

        abilities.forget("runner");
        assert_eq!(abilities.use_jump(&handle, true), AbilityUse::Used);
    }
}
