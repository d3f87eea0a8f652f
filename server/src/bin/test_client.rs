//! Headless scripted client for poking a running server by hand.
//!
//! Connects, runs the join handshake, reports ready, then walks a
//! short fixed script while printing every snapshot it receives.

use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::sleep;

use shared::protocol::{encode_string, Command, OP_READY};
use shared::Area;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:9321")]
    address: String,
    /// Player name to register with
    #[clap(short, long, default_value = "tester")]
    name: String,
    /// Avatar index
    #[clap(long, default_value = "0")]
    avatar: u8,
    /// Snapshots to print before disconnecting
    #[clap(short, long, default_value = "20")]
    snapshots: usize,
}

async fn read_u32<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).await?;
    Ok(u32::from_be_bytes(buf))
}

async fn read_string<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<String> {
    let len = read_u32(reader).await? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).await?;
    String::from_utf8(bytes).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "frame is not valid UTF-8")
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.address);
    let stream = TcpStream::connect(&args.address).await?;
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    // Map blocks until the empty sentinel.
    loop {
        let block = read_string(&mut reader).await?;
        if block.is_empty() {
            break;
        }
        let area = Area::parse(&block)?;
        println!(
            "Received area {} ({}x{}): {}",
            area.id, area.width, area.height, area.description
        );
    }

    let player_id = read_u32(&mut reader).await?;
    println!("Assigned player id {}", player_id);

    writer.write_all(&[args.avatar]).await?;
    writer.write_all(&encode_string(&args.name)).await?;
    writer.flush().await?;

    let virus = read_u32(&mut reader).await?;
    let roster = read_string(&mut reader).await?;
    println!("Infected with virus {} (avatars: {})", virus, roster);

    println!("Reporting ready, waiting for the session to start...");
    writer.write_all(&Command::Ready.encode()).await?;
    writer.flush().await?;

    let start = reader.read_u8().await?;
    if start != OP_READY {
        return Err(format!("expected the start byte, got 0x{:02X}", start).into());
    }
    println!("Session started");

    let script = [
        Command::Forward,
        Command::Forward,
        Command::TurnRight,
        Command::Forward,
        Command::Chat("anyone out there?".to_string()),
        Command::TakeItems,
    ];
    let mut script = script.iter();

    for n in 0..args.snapshots {
        let snapshot = read_string(&mut reader).await?;
        println!("--- snapshot {} ---\n{}", n, snapshot);

        if let Some(command) = script.next() {
            writer.write_all(&command.encode()).await?;
            writer.flush().await?;
        }
        sleep(Duration::from_millis(50)).await;
    }

    println!("Disconnecting");
    writer.write_all(&Command::Disconnect.encode()).await?;
    writer.flush().await?;
    Ok(())
}
