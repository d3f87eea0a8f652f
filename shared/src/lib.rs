pub mod area;
pub mod item;
pub mod position;
pub mod protocol;

pub use area::{
    Area, Container, ContainerKind, Lock, Lockable, MapElement, MapParseError, ObstacleKind,
    Transition,
};
pub use item::{Item, VirusKind, ALL_VIRUSES};
pub use position::{Direction, Position, Step, Turn};
pub use protocol::{Command, ProtocolError};

pub const INVENTORY_CAPACITY: usize = 8;
pub const CHEST_CAPACITY: usize = 5;
pub const CUPBOARD_CAPACITY: usize = 3;
pub const SCRAP_PILE_CAPACITY: usize = 2;

pub const TORCH_BURN_SECONDS: u32 = 90;
pub const STARTING_HEALTH: i32 = 100;

/// Day runs 06:00-18:00 in simulated seconds since midnight.
pub const DAY_START_SECOND: u64 = 6 * 3600;
pub const DAY_END_SECOND: u64 = 18 * 3600;

/// Visibility radii sent back per tick (cells).
pub const VISIBILITY_DAY: u32 = 5;
pub const VISIBILITY_NIGHT_TORCH: u32 = 3;
pub const VISIBILITY_NIGHT: u32 = 2;

/// Playable avatars, indexed by the byte the client sends during the
/// handshake. Out-of-range picks wrap.
pub const AVATARS: [&str; 4] = ["scout", "ranger", "miner", "medic"];
