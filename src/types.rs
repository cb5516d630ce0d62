//! Type definitions for tnt-run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inventory slots the arena writes to
pub mod slots {
    /// Spectator leave item
    pub const LEAVE_ITEM: usize = 0;
    /// Speed boost feather, kept across the combat loadout swap
    pub const SPEED_FEATHER: usize = 2;
}

/// Integer block coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn above(self, n: i32) -> Self {
        Self::new(self.x, self.y + n, self.z)
    }
}

impl From<[i32; 3]> for Coord {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Coord> for [i32; 3] {
    fn from(c: Coord) -> Self {
        [c.x, c.y, c.z]
    }
}

/// Storage key format: `x:y:z`
impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.y, self.z)
    }
}

impl FromStr for Coord {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.split(':').map(|p| p.trim().parse::<i32>());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), Some(Ok(z)), None) => Ok(Self::new(x, y, z)),
            _ => Err(format!("bad coordinate key: {s}")),
        }
    }
}

/// Continuous position of a player
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The tile directly under the player's feet.
    pub fn block_below(&self) -> Coord {
        Coord::new(
            self.x.floor() as i32,
            (self.y.floor() as i32).saturating_sub(1),
            self.z.floor() as i32,
        )
    }

    /// Standing spot centered on top of a tile.
    pub fn on_top_of(tile: Coord) -> Self {
        Self::new(tile.x as f64 + 0.5, (tile.y + 1) as f64, tile.z as f64 + 0.5)
    }

    pub fn raised(self, dy: f64) -> Self {
        Self::new(self.x, self.y + dy, self.z)
    }
}

impl From<[f64; 3]> for Position {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Position> for [f64; 3] {
    fn from(p: Position) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Axis-aligned box of tiles, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub min: Coord,
    pub max: Coord,
}

impl Region {
    /// Normalize two arbitrary corners into a min/max box.
    pub fn from_corners(a: Coord, b: Coord) -> Self {
        Self {
            min: Coord::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Coord::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn contains(&self, c: Coord) -> bool {
        (self.min.x..=self.max.x).contains(&c.x)
            && (self.min.y..=self.max.y).contains(&c.y)
            && (self.min.z..=self.max.z).contains(&c.z)
    }

    pub fn volume(&self) -> u64 {
        let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1).max(0) as u64;
        span(self.min.x, self.max.x) * span(self.min.y, self.max.y) * span(self.min.z, self.max.z)
    }

    /// Every coordinate in the box, x-major.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (self.min.x..=self.max.x).flat_map(move |x| {
            (self.min.y..=self.max.y)
                .flat_map(move |y| (self.min.z..=self.max.z).map(move |z| Coord::new(x, y, z)))
        })
    }
}

/// Numeric tile type id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(pub u16);

impl TileId {
    pub const AIR: TileId = TileId(0);
    pub const STONE: TileId = TileId(1);
    pub const SAND: TileId = TileId(12);
    pub const GRAVEL: TileId = TileId(13);
    pub const TNT: TileId = TileId(46);

    pub fn is_air(self) -> bool {
        self == Self::AIR
    }

    /// Resolve a configured tile name (`"tnt"`) or numeric id (`"46"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "air" => Some(Self::AIR),
            "stone" => Some(Self::STONE),
            "sand" => Some(Self::SAND),
            "gravel" => Some(Self::GRAVEL),
            "tnt" => Some(Self::TNT),
            other => other.parse().ok().map(TileId),
        }
    }
}

/// Arena lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Waiting,
    Countdown,
    Running,
    Ending,
}

impl Phase {
    /// Legal edges of the round state machine. Any phase may fall back to
    /// `Idle` through a reset.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (_, Idle)
                | (Idle, Waiting)
                | (Waiting, Countdown)
                | (Countdown, Running)
                | (Running, Ending)
        )
    }

    /// Players are still gathering; nobody is on a collapsing floor yet.
    pub fn is_pregame(self) -> bool {
        matches!(self, Phase::Idle | Phase::Waiting | Phase::Countdown)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Phase::Running | Phase::Ending)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Waiting => "waiting",
            Phase::Countdown => "countdown",
            Phase::Running => "running",
            Phase::Ending => "ending",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Survival,
    Spectator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item {
    SpeedFeather,
    LeaveBed,
}

/// Why a participant left the alive set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EliminationCause {
    Fell,
    Death,
    Eliminated,
}

/// Outcome tag handed to the relocation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    GameWon,
    GameEnd,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::GameWon => "game_won",
            Outcome::GameEnd => "game_end",
        }
    }
}

/// Status sample emitted on every phase or population change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStatus {
    pub phase: Phase,
    pub current: usize,
    pub capacity: usize,
}

/// Registry listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaSummary {
    pub name: String,
    pub world: String,
    pub ready: bool,
    pub phase: Phase,
    pub alive: usize,
    pub spectators: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_below() {
        assert_eq!(Position::new(1.5, 65.0, -0.5).block_below(), Coord::new(1, 64, -1));
        assert_eq!(Position::new(0.0, 64.2, 0.0).block_below(), Coord::new(0, 63, 0));
    }

    #[test]
    fn test_block_below_saturates_at_the_bottom() {
        let deep = Position::new(0.0, f64::NEG_INFINITY, 0.0).block_below();
        assert_eq!(deep.y, i32::MIN);
        assert_eq!(Position::new(0.0, -1e12, 0.0).block_below().y, i32::MIN);
    }
}
