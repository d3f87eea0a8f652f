//! Authoritative game server for the maze survival game.
//!
//! All world state is owned by a single [`game::Game`] behind a
//! read-write lock. One task per connection translates wire commands
//! into coordinator calls and streams snapshots back; a separate task
//! drives the decay clock. Clients render, the server decides.

pub mod clock;
pub mod connection;
pub mod error;
pub mod game;
pub mod player;
pub mod session;
pub mod snapshot;
pub mod world;
