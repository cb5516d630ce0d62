//! Error types for tnt-run

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Arena not found: {0}")]
    ArenaNotFound(String),

    #[error("Arena already exists: {0}")]
    ArenaExists(String),

    #[error("Arena setup is not complete: {0}")]
    NotReady(String),

    #[error("World not loaded: {0}")]
    WorldNotLoaded(String),

    #[error("Round in progress")]
    RoundInProgress,

    #[error("Arena is full")]
    ArenaFull,

    #[error("Already in arena")]
    AlreadyInArena,

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Region selection incomplete")]
    SetupIncomplete,

    #[error("Invalid arena data: {0}")]
    InvalidArenaData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ArenaError>;
