//! Session orchestration: accept a fixed roster of clients, gate the
//! start on everyone reporting ready, then run the decay clock until
//! the last handler returns.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};

use crate::connection::Connection;
use crate::game::Game;

/// Knobs for one session.
pub struct SessionConfig {
    /// Candidate listen ports, tried in order.
    pub ports: Vec<u16>,
    /// Number of players to wait for before the lobby can start.
    pub players: usize,
    /// Snapshot cadence per connection.
    pub tick: Duration,
    /// Real-time period between decay ticks.
    pub decay_period: Duration,
}

pub struct Session {
    listener: TcpListener,
    game: Arc<RwLock<Game>>,
    config: SessionConfig,
}

impl Session {
    /// Binds the first free candidate port. Running out of candidates
    /// is fatal.
    pub async fn bind(game: Arc<RwLock<Game>>, config: SessionConfig) -> io::Result<Session> {
        let mut last_err = None;
        for &port in &config.ports {
            match TcpListener::bind(("0.0.0.0", port)).await {
                Ok(listener) => {
                    info!("listening on {}", listener.local_addr()?);
                    return Ok(Session {
                        listener,
                        game,
                        config,
                    });
                }
                Err(err) => {
                    debug!("port {} unavailable: {}", port, err);
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "no candidate ports")
        }))
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the full roster, waits for every ready frame, starts
    /// the decay clock, and returns once all handlers have finished.
    pub async fn run(self) -> io::Result<()> {
        let mut connections = Vec::with_capacity(self.config.players);
        while connections.len() < self.config.players {
            let (stream, peer) = self.listener.accept().await?;
            debug!("accepted {}", peer);
            match Connection::handshake(stream, Arc::clone(&self.game), self.config.tick).await {
                Ok(connection) => connections.push(connection),
                Err(err) => error!("handshake with {} failed: {}", peer, err),
            }
        }
        info!("lobby full with {} players", connections.len());

        let (ready_tx, mut ready_rx) = mpsc::channel::<u32>(self.config.players);
        let (start_tx, start_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(connections.len());
        for mut connection in connections {
            let ready_tx = ready_tx.clone();
            let start_rx = start_rx.clone();
            handles.push(tokio::spawn(async move {
                let id = connection.player_id();
                if let Err(err) = connection.wait_ready().await {
                    error!("player {} dropped in the lobby: {}", id, err);
                    connection.close().await;
                    return;
                }
                if ready_tx.send(id).await.is_err() {
                    return;
                }
                drop(ready_tx);
                if let Err(err) = connection.run(start_rx).await {
                    error!("player {} handler failed: {}", id, err);
                }
            }));
        }
        drop(ready_tx);

        let mut ready = 0;
        while ready < self.config.players {
            match ready_rx.recv().await {
                Some(id) => {
                    ready += 1;
                    info!("player {} ready ({}/{})", id, ready, self.config.players);
                }
                None => break, // a handler died in the lobby
            }
        }
        if start_tx.send(true).is_err() {
            error!("all handlers gone before the session started");
        } else {
            info!("all players ready, session starting");
        }

        let game = Arc::clone(&self.game);
        let decay_period = self.config.decay_period;
        let decay = tokio::spawn(async move {
            let mut ticker = interval(decay_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                game.write().await.tick(1);
            }
        });

        for handle in handles {
            if let Err(err) = handle.await {
                error!("handler task panicked: {}", err);
            }
        }
        decay.abort();
        info!("session over");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::default_world;

    fn test_config(ports: Vec<u16>) -> SessionConfig {
        SessionConfig {
            ports,
            players: 1,
            tick: Duration::from_millis(50),
            decay_period: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_bind_falls_back_to_the_next_port() {
        let occupied = TcpListener::bind(("0.0.0.0", 0)).await.unwrap();
        let taken = occupied.local_addr().unwrap().port();

        let game = Arc::new(RwLock::new(default_world(100)));
        let session = Session::bind(game, test_config(vec![taken, 0])).await.unwrap();
        assert_ne!(session.local_addr().unwrap().port(), taken);
    }

    #[tokio::test]
    async fn test_bind_fails_when_every_port_is_taken() {
        let occupied = TcpListener::bind(("0.0.0.0", 0)).await.unwrap();
        let taken = occupied.local_addr().unwrap().port();

        let game = Arc::new(RwLock::new(default_world(100)));
        assert!(Session::bind(game, test_config(vec![taken])).await.is_err());
    }
}
