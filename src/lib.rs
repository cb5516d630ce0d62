//! # tnt-run
//!
//! Round-based floor survival arenas. Players stand on a floor of collapsible
//! tiles that vanish under their feet; whoever falls too far is out, the last
//! runner standing wins, and the floor is put back for the next round.
//!
//! ## Features
//!
//! - **Explicit lifecycle**: Idle, Waiting, Countdown, Running, Ending
//! - **Floor tracking**: every removed tile is restored on reset
//! - **Spawn distribution**: no repeated spawn point until all are used
//! - **Delayed PVP**: warning, then combat gear for every runner
//! - **Registry**: arenas by name and by world, reloadable from disk
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tnt_run::{ArenaContext, ArenaRegistry, ArenaStore, GameConfig, Scheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(GameConfig::load("config.json")?);
//!     let ctx = ArenaContext::new(config.clone(), my_world_store());
//!     let registry = Arc::new(ArenaRegistry::new(ArenaStore::open("arenas")?, ctx));
//!     registry.load_all().await?;
//!
//!     let scheduler = Scheduler::spawn(registry.clone(), &config);
//!     registry.join("main", my_player_session()).await?;
//!
//!     // ...
//!     scheduler.shutdown().await;
//!     registry.reset_all().await;
//!     Ok(())
//! }
//! ```

pub mod abilities;
pub mod arena;
pub mod config;
pub mod controller;
pub mod error;
pub mod floor;
pub mod registry;
pub mod relocation;
pub mod scheduler;
pub mod session;
pub mod setup;
pub mod sim;
pub mod spawn;
pub mod store;
pub mod types;
pub mod world;

pub use abilities::{Abilities, AbilityUse};
pub use arena::{Arena, ArenaContext, ArenaEvent, DamageSource, Notice};
pub use config::GameConfig;
pub use controller::{Controller, PvpActivation, WaitingCountdown};
pub use error::{ArenaError, Result};
pub use floor::FloorTracker;
pub use registry::{ArenaRegistry, SharedArena};
pub use relocation::{Relocator, StaggeredRelocator, StayPut};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use session::{Participant, Session};
pub use setup::{SetupSession, create_arena};
pub use spawn::SpawnAllocator;
pub use store::{ArenaDefinition, ArenaStore};
pub use types::*;
pub use world::TileStore;
