//! One task per connected client.
//!
//! The handler walks a fixed lifecycle: handshake (maps, id, identity,
//! virus, roster), lobby wait (block until the client reports ready),
//! run wait (block until every handler is released), then the snapshot
//! loop. All game state lives behind the shared [`Game`] lock; the
//! handler only translates wire frames into coordinator calls.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, timeout, MissedTickBehavior};

use shared::protocol::{
    Command, OP_CHAT, OP_DESTROY_ITEM, OP_PUT_ITEM, OP_READY, OP_USE_ITEM,
};
use shared::{Step, Turn, AVATARS};

use crate::error::GameError;
use crate::game::Game;

/// Upper bound on any length-prefixed frame we accept from a client.
const MAX_FRAME_LEN: u32 = 64 * 1024;

/// How long the snapshot loop polls for an inbound command each tick.
const COMMAND_POLL: Duration = Duration::from_millis(2);

fn game_error(err: GameError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

pub(crate) async fn write_u32<W: AsyncWrite + Unpin>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes()).await
}

pub(crate) async fn write_string<W: AsyncWrite + Unpin>(
    writer: &mut W,
    text: &str,
) -> io::Result<()> {
    writer.write_all(&shared::protocol::encode_string(text)).await
}

pub(crate) async fn read_u32<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).await?;
    Ok(u32::from_be_bytes(buf))
}

pub(crate) async fn read_string<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<String> {
    let len = read_u32(reader).await?;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("string frame of {} bytes exceeds the limit", len),
        ));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).await?;
    String::from_utf8(bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame is not valid UTF-8"))
}

/// Reads one command frame. An unrecognized opcode is a protocol
/// violation and surfaces as `InvalidData`, which tears the
/// connection down.
pub(crate) async fn read_command<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Command> {
    let opcode = reader.read_u8().await?;
    read_command_body(reader, opcode).await
}

/// Completes a frame whose opcode byte has already been read.
async fn read_command_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    opcode: u8,
) -> io::Result<Command> {
    let mut frame = vec![opcode];
    match opcode {
        OP_USE_ITEM | OP_DESTROY_ITEM | OP_PUT_ITEM => {
            let mut payload = [0u8; 4];
            reader.read_exact(&mut payload).await?;
            frame.extend_from_slice(&payload);
        }
        OP_CHAT => {
            let text = read_string(reader).await?;
            frame.extend_from_slice(&(text.len() as u32).to_be_bytes());
            frame.extend_from_slice(text.as_bytes());
        }
        _ => {}
    }
    let (command, _) = Command::decode(&frame)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    Ok(command)
}

/// Polls for one command without ever desyncing the stream.
///
/// Only the one-byte opcode read runs under the timeout: a single-byte
/// read either consumes its byte and completes or consumes nothing, so
/// a closed window can never discard part of a frame. Once the opcode
/// is in, the rest of the frame is read to completion even if its
/// payload straddles ticks.
pub(crate) async fn poll_command<R: AsyncRead + Unpin>(
    reader: &mut R,
    window: Duration,
) -> io::Result<Option<Command>> {
    let opcode = match timeout(window, reader.read_u8()).await {
        Err(_) => return Ok(None),
        Ok(opcode) => opcode?,
    };
    Ok(Some(read_command_body(reader, opcode).await?))
}

/// Server side of one client connection, post-handshake.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    game: Arc<RwLock<Game>>,
    player_id: u32,
    tick: Duration,
}

impl Connection {
    /// Runs the join handshake on a fresh socket and registers the
    /// player with the coordinator.
    ///
    /// Order on the wire: every area map block, an empty-string
    /// sentinel, the assigned player id; then the client's avatar byte
    /// and name; then the player's virus ordinal and the avatar roster.
    ///
    /// On any handshake failure the player is deregistered again, so a
    /// client that dies mid-handshake never lingers in the world.
    pub async fn handshake(
        stream: TcpStream,
        game: Arc<RwLock<Game>>,
        tick: Duration,
    ) -> io::Result<Connection> {
        let peer = stream.peer_addr()?;
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let player_id = game.write().await.reserve_id();
        match Self::exchange_identity(&mut reader, &mut writer, &game, player_id).await {
            Ok(name) => {
                info!("player {} ({}) joined from {}", player_id, name, peer);
                Ok(Connection {
                    reader,
                    writer,
                    game,
                    player_id,
                    tick,
                })
            }
            Err(err) => {
                if game.write().await.remove_player(player_id).is_ok() {
                    debug!("player {} deregistered after failed handshake", player_id);
                }
                Err(err)
            }
        }
    }

    async fn exchange_identity(
        reader: &mut BufReader<OwnedReadHalf>,
        writer: &mut OwnedWriteHalf,
        game: &Arc<RwLock<Game>>,
        player_id: u32,
    ) -> io::Result<String> {
        let maps = game.read().await.area_map_strings();
        for map in &maps {
            write_string(writer, map).await?;
        }
        write_string(writer, "").await?;
        write_u32(writer, player_id).await?;
        writer.flush().await?;

        let avatar = reader.read_u8().await?;
        let name = read_string(reader).await?;

        let virus = {
            let mut game = game.write().await;
            game.register_player(player_id, name.clone(), avatar)
                .map_err(game_error)?;
            game.player(player_id).map_err(game_error)?.virus
        };
        write_u32(writer, virus.ordinal()).await?;
        write_string(writer, &AVATARS.join(",")).await?;
        writer.flush().await?;
        Ok(name)
    }

    pub fn player_id(&self) -> u32 {
        self.player_id
    }

    /// Blocks until the client sends its ready frame. Anything else
    /// received in the lobby is discarded.
    pub async fn wait_ready(&mut self) -> io::Result<()> {
        loop {
            match read_command(&mut self.reader).await? {
                Command::Ready => {
                    debug!("player {} is ready", self.player_id);
                    return Ok(());
                }
                other => {
                    debug!(
                        "player {} sent {:?} before the session started, ignoring",
                        self.player_id, other
                    );
                }
            }
        }
    }

    /// The snapshot loop: once the start signal fires, send one state
    /// snapshot per tick and poll briefly for an inbound command.
    pub async fn run(mut self, mut start: watch::Receiver<bool>) -> io::Result<()> {
        while !*start.borrow() {
            if start.changed().await.is_err() {
                self.close().await;
                return Ok(());
            }
        }
        self.writer.write_all(&[OP_READY]).await?;
        self.writer.flush().await?;
        info!("player {} entering the session", self.player_id);

        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;

            let snapshot = {
                let mut game = self.game.write().await;
                match game.snapshot_for(self.player_id) {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!("player {} dropped from the game: {}", self.player_id, err);
                        break;
                    }
                }
            };
            if write_string(&mut self.writer, &snapshot).await.is_err() {
                break;
            }
            if self.writer.flush().await.is_err() {
                break;
            }

            match poll_command(&mut self.reader, COMMAND_POLL).await {
                Ok(None) => {} // nothing queued this tick
                Ok(Some(command)) => {
                    if !self.apply(command).await {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    info!("player {} hung up", self.player_id);
                    break;
                }
                Err(err) => {
                    warn!("player {}: dropping connection: {}", self.player_id, err);
                    break;
                }
            }
        }

        self.close().await;
        Ok(())
    }

    /// Applies one command to the coordinator. Returns false when the
    /// connection should close.
    async fn apply(&mut self, command: Command) -> bool {
        let id = self.player_id;
        let mut game = self.game.write().await;
        let result = match command {
            Command::Forward => game.move_player(id, Step::Forward),
            Command::Back => game.move_player(id, Step::Back),
            Command::StrafeLeft => game.move_player(id, Step::Left),
            Command::StrafeRight => game.move_player(id, Step::Right),
            Command::TurnLeft => game.turn_player(id, Turn::Left),
            Command::TurnRight => game.turn_player(id, Turn::Right),
            Command::Transit => game.transit(id),
            Command::UseItem(index) => game.use_item(id, index as usize),
            Command::DestroyItem(index) => game.destroy_item(id, index as usize),
            Command::PutItem(index) => game.put_item(id, index as usize),
            Command::TakeItems => game.take_items(id),
            Command::Unlock => game.unlock(id),
            Command::Chat(ref text) => game.push_chat(id, text).map(|_| true),
            Command::Save => {
                let state = game.save_string();
                drop(game);
                return self.write_save(state).await;
            }
            Command::Load => game
                .notify(id, "loading a save is not available mid-session")
                .map(|_| true),
            Command::Ready => Ok(true),
            Command::Disconnect => {
                info!("player {} disconnecting", id);
                return false;
            }
        };
        match result {
            Ok(true) => true,
            Ok(false) => {
                debug!("player {}: {} rejected", id, command_name(&command));
                true
            }
            Err(err) => {
                warn!("player {}: {}", id, err);
                false
            }
        }
    }

    async fn write_save(&mut self, state: String) -> bool {
        let path = format!("save_player_{}.json", self.player_id);
        let outcome = match tokio::fs::write(&path, state).await {
            Ok(()) => format!("game saved to {}", path),
            Err(err) => {
                warn!("player {}: save failed: {}", self.player_id, err);
                "saving failed".to_string()
            }
        };
        let mut game = self.game.write().await;
        game.notify(self.player_id, &outcome).is_ok()
    }

    /// Deregisters the player. Safe to call after the player is
    /// already gone.
    pub(crate) async fn close(&mut self) {
        let mut game = self.game.write().await;
        match game.remove_player(self.player_id) {
            Ok(()) => info!("player {} left the game", self.player_id),
            Err(err) => debug!("player {} already removed: {}", self.player_id, err),
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Forward => "forward",
        Command::Back => "back",
        Command::StrafeLeft => "strafe left",
        Command::StrafeRight => "strafe right",
        Command::TurnLeft => "turn left",
        Command::TurnRight => "turn right",
        Command::Transit => "transit",
        Command::UseItem(_) => "use item",
        Command::DestroyItem(_) => "destroy item",
        Command::PutItem(_) => "put item",
        Command::TakeItems => "take items",
        Command::Unlock => "unlock",
        Command::Save => "save",
        Command::Load => "load",
        Command::Chat(_) => "chat",
        Command::Disconnect => "disconnect",
        Command::Ready => "ready",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::OP_FORWARD;

    #[tokio::test]
    async fn test_string_frames_roundtrip_over_a_duplex_pipe() {
        let (mut client, mut server) = tokio::io::duplex(256);
        write_string(&mut client, "hello maze").await.unwrap();
        assert_eq!(read_string(&mut server).await.unwrap(), "hello maze");

        write_string(&mut client, "").await.unwrap();
        assert_eq!(read_string(&mut server).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_oversized_string_frame_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client
            .write_all(&(MAX_FRAME_LEN + 1).to_be_bytes())
            .await
            .unwrap();
        let err = read_string(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_read_command_plain_and_payload() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(&[OP_FORWARD]).await.unwrap();
        client
            .write_all(&Command::PutItem(3).encode())
            .await
            .unwrap();
        client
            .write_all(&Command::Chat("over here".to_string()).encode())
            .await
            .unwrap();

        assert_eq!(read_command(&mut server).await.unwrap(), Command::Forward);
        assert_eq!(
            read_command(&mut server).await.unwrap(),
            Command::PutItem(3)
        );
        assert_eq!(
            read_command(&mut server).await.unwrap(),
            Command::Chat("over here".to_string())
        );
    }

    #[tokio::test]
    async fn test_poll_window_never_splits_a_frame() {
        let (mut client, mut server) = tokio::io::duplex(256);
        let frame = Command::Chat("hello".to_string()).encode();

        // Opcode now, the payload only well after the poll window has
        // expired. The command must still arrive intact.
        client.write_all(&frame[..1]).await.unwrap();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(COMMAND_POLL * 5).await;
            client.write_all(&frame[1..]).await.unwrap();
        });

        let command = poll_command(&mut server, COMMAND_POLL).await.unwrap();
        assert_eq!(command, Some(Command::Chat("hello".to_string())));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_poll_idle_window_consumes_nothing() {
        let (mut client, mut server) = tokio::io::duplex(16);
        assert_eq!(poll_command(&mut server, COMMAND_POLL).await.unwrap(), None);

        // The stream is still in sync after an empty poll.
        client.write_all(&Command::Unlock.encode()).await.unwrap();
        assert_eq!(
            poll_command(&mut server, Duration::from_secs(1)).await.unwrap(),
            Some(Command::Unlock)
        );
    }

    #[tokio::test]
    async fn test_unknown_opcode_is_invalid_data() {
        let (mut client, mut server) = tokio::io::duplex(16);
        client.write_all(&[0x7F]).await.unwrap();
        let err = read_command(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_closed_pipe_is_unexpected_eof() {
        let (client, mut server) = tokio::io::duplex(16);
        drop(client);
        let err = read_command(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
