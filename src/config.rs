//! Game configuration
//!
//! Every tunable has a default matching a stock server. A config file is a
//! JSON document with kebab-case keys; missing keys fall back to defaults.

use crate::error::Result;
use crate::types::TileId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GameConfig {
    /// Alive players needed before the wait timer starts (default: 2)
    pub min_players_to_start: usize,
    /// Arena capacity; reaching it skips the wait (default: 16)
    pub max_players_per_arena: usize,
    /// Seconds to wait for more players (default: 60)
    pub wait_time_seconds: u32,
    /// Seconds of countdown before the floor goes live (default: 5)
    pub countdown_seconds: u32,
    /// Tile names that vanish when stood on
    pub fall_blocks: Vec<String>,
    pub elimination: EliminationConfig,
    pub pvp_mode: PvpConfig,
    pub spectator: SpectatorConfig,
    pub game_end: GameEndConfig,
    pub hub_server: HubConfig,
    pub speed_boost: SpeedBoostConfig,
    pub jump_boost: JumpBoostConfig,
    pub timing: TimingConfig,
    /// Put players into an arena when they connect (default: true)
    pub auto_join_enabled: bool,
    /// Arena tried first on connect (default: "main")
    pub auto_join_arena: String,
    /// Arena building in progress; nobody is auto-joined (default: false)
    pub edit_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EliminationConfig {
    pub base_y_level: i32,
    pub max_fall_distance: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PvpConfig {
    pub enabled: bool,
    pub activation_time_minutes: u32,
    pub warning_time_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SpectatorConfig {
    pub auto_spectate_on_death: bool,
    pub spectator_height_offset: f64,
    pub give_leave_item: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GameEndConfig {
    pub send_to_spawn: bool,
    pub transfer_to_hub: bool,
    pub kick_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HubConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    pub transfer_message: String,
    /// Seconds before the first transfer
    pub transfer_delay: u64,
    /// Extra seconds per subsequent player
    pub staggered_transfer_delay: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SpeedBoostConfig {
    pub cooldown_seconds: u64,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct JumpBoostConfig {
    pub cooldown_minutes: u64,
    pub launch_height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimingConfig {
    /// Floor tick period in milliseconds (default: 250, five server ticks)
    pub floor_tick_millis: u64,
    /// Run the win check on every Nth floor tick (default: 4)
    pub win_check_every: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players_to_start: 2,
            max_players_per_arena: 16,
            wait_time_seconds: 60,
            countdown_seconds: 5,
            fall_blocks: vec!["tnt".to_string(), "sand".to_string(), "gravel".to_string()],
            elimination: EliminationConfig::default(),
            pvp_mode: PvpConfig::default(),
            spectator: SpectatorConfig::default(),
            game_end: GameEndConfig::default(),
            hub_server: HubConfig::default(),
            speed_boost: SpeedBoostConfig::default(),
            jump_boost: JumpBoostConfig::default(),
            timing: TimingConfig::default(),
            auto_join_enabled: true,
            auto_join_arena: "main".to_string(),
            edit_mode: false,
        }
    }
}

impl Default for EliminationConfig {
    fn default() -> Self {
        Self {
            base_y_level: 73,
            max_fall_distance: 5,
        }
    }
}

impl Default for PvpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            activation_time_minutes: 3,
            warning_time_seconds: 30,
        }
    }
}

impl Default for SpectatorConfig {
    fn default() -> Self {
        Self {
            auto_spectate_on_death: true,
            spectator_height_offset: 10.0,
            give_leave_item: true,
        }
    }
}

impl Default for GameEndConfig {
    fn default() -> Self {
        Self {
            send_to_spawn: true,
            transfer_to_hub: true,
            kick_message: "Game ended! Thanks for playing!".to_string(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: String::new(),
            port: 19132,
            transfer_message: "Returning to hub...".to_string(),
            transfer_delay: 3,
            staggered_transfer_delay: 2,
        }
    }
}

impl Default for SpeedBoostConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 20,
            duration_seconds: 7,
        }
    }
}

impl Default for JumpBoostConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: 3,
            launch_height: 8.0,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            floor_tick_millis: 250,
            win_check_every: 4,
        }
    }
}

impl GameConfig {
    /// Parse a JSON config document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file, or the defaults if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn min_players(mut self, n: usize) -> Self {
        self.min_players_to_start = n;
        self
    }

    pub fn max_players(mut self, n: usize) -> Self {
        self.max_players_per_arena = n;
        self
    }

    pub fn wait_seconds(mut self, secs: u32) -> Self {
        self.wait_time_seconds = secs;
        self
    }

    pub fn countdown(mut self, secs: u32) -> Self {
        self.countdown_seconds = secs;
        self
    }

    pub fn pvp(mut self, enabled: bool, activation_minutes: u32, warning_seconds: u32) -> Self {
        self.pvp_mode = PvpConfig {
            enabled,
            activation_time_minutes: activation_minutes,
            warning_time_seconds: warning_seconds,
        };
        self
    }

    pub fn elimination(mut self, base_y_level: i32, max_fall_distance: i32) -> Self {
        self.elimination = EliminationConfig {
            base_y_level,
            max_fall_distance,
        };
        self
    }

    pub fn hub(mut self, address: impl Into<String>, port: u16) -> Self {
        self.hub_server.address = address.into();
        self.hub_server.port = port;
        self
    }

    pub fn auto_join(mut self, enabled: bool, arena: impl Into<String>) -> Self {
        self.auto_join_enabled = enabled;
        self.auto_join_arena = arena.into();
        self
    }

    pub fn edit_mode(mut self, on: bool) -> Self {
        self.edit_mode = on;
        self
    }

    /// The one threshold both the periodic win check and the fall/death
    /// event path use. At or below it a runner is out.
    pub fn elimination_y(&self) -> f64 {
        f64::from(self.elimination.base_y_level - self.elimination.max_fall_distance)
    }

    /// Resolve `fall-blocks` to tile ids; unknown names are skipped.
    pub fn collapsible_tiles(&self) -> HashSet<TileId> {
        self.fall_blocks
            .iter()
            .filter_map(|name| {
                let tile = TileId::from_name(name);
                if tile.is_none() {
                    warn!("Unknown fall block '{}' in config", name);
                }
                tile
            })
            .filter(|t| !t.is_air())
            .collect()
    }

    pub fn pvp_activation(&self) -> Duration {
        Duration::from_secs(u64::from(self.pvp_mode.activation_time_minutes) * 60)
    }

    pub fn floor_tick(&self) -> Duration {
        Duration::from_millis(self.timing.floor_tick_millis.max(1))
    }

    /// Hub transfer is possible only with an address configured.
    pub fn hub_available(&self) -> bool {
        self.hub_server.enabled && !self.hub_server.address.is_empty()
    }
}
