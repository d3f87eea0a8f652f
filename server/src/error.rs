use thiserror::Error;

/// Domain-invariant failures. These are bugs or world-construction
/// problems, never ordinary rejected player actions (those are plain
/// `false` returns).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("unknown player id {0}")]
    UnknownPlayer(u32),
    #[error("world has no free spawn cell")]
    NoFreeSpawn,
}
