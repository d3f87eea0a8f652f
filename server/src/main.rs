use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::RwLock;

use server::session::{Session, SessionConfig};
use server::world::default_world;
use shared::STARTING_HEALTH;

/// Parses command-line arguments, builds the default world and runs
/// one session to completion.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Candidate listen ports, tried in order
        #[clap(short, long, value_delimiter = ',', default_value = "9321,9322,9323")]
        ports: Vec<u16>,
        /// Number of players the lobby waits for
        #[clap(short = 'n', long, default_value = "2")]
        players: usize,
        /// Snapshot cadence in milliseconds
        #[clap(short, long, default_value = "200")]
        tick_ms: u64,
        /// Real-time milliseconds per decay tick
        #[clap(short, long, default_value = "1000")]
        decay_ms: u64,
        /// Starting health for every player
        #[clap(long, default_value_t = STARTING_HEALTH)]
        health: i32,
    }

    let args = Args::parse();

    let game = Arc::new(RwLock::new(default_world(args.health)));
    let config = SessionConfig {
        ports: args.ports,
        players: args.players,
        tick: Duration::from_millis(args.tick_ms),
        decay_period: Duration::from_millis(args.decay_ms),
    };

    let session = Session::bind(game, config).await?;
    session.run().await?;
    Ok(())
}
