//! Player session collaborator
//!
//! The arena calls into sessions but owns none of their lifecycle. Handles are
//! shared, so every method takes `&self`.

use crate::types::{GameMode, Item, Position};
use std::sync::Arc;

pub trait Session: Send + Sync {
    /// Unique player name; the key for every membership set.
    fn name(&self) -> &str;

    fn is_online(&self) -> bool;

    /// World the player is currently in, if any.
    fn world_name(&self) -> Option<String>;

    fn position(&self) -> Position;

    fn teleport(&self, world: &str, to: Position);

    fn set_mode(&self, mode: GameMode);

    fn clear_inventory(&self);

    fn set_slot(&self, slot: usize, item: Item);

    /// Sword, jump item and armor; keeps the speed feather.
    fn equip_combat_loadout(&self);

    fn send_message(&self, message: &str);

    fn apply_speed(&self, duration_secs: u32, amplifier: u8);

    fn launch(&self, height: f64);

    /// Hand the player to another server. Returns false if refused.
    fn transfer(&self, address: &str, port: u16, message: &str) -> bool;

    fn kick(&self, message: &str);
}

/// Shared handle to a player session
pub type Participant = Arc<dyn Session>;

/// Message every online player in the list.
pub fn broadcast<'a>(players: impl IntoIterator<Item = &'a Participant>, message: &str) {
    for p in players {
        if p.is_online() {
            p.send_message(message);
        }
    }
}
