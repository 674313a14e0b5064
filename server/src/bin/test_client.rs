//! Headless bot that joins an arena, steers randomly and reports what it sees.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{Direction, Packet, Turn, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, Instant};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// How long to play before disconnecting, in seconds
    #[arg(short = 'd', long, default_value = "10")]
    duration: u64,

    /// Milliseconds between steering decisions
    #[arg(short = 'i', long, default_value = "300")]
    turn_interval: u64,
}

async fn send(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) -> Result<(), BoxError> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

fn random_turn(rng: &mut impl Rng) -> Turn {
    match rng.gen_range(0..3) {
        0 => Turn::Left,
        1 => Turn::Right,
        _ => {
            let direction = Direction::ALL
                .choose(rng)
                .copied()
                .unwrap_or_default();
            Turn::Absolute(direction)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let server_addr: SocketAddr = args.server.parse()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);

    info!("Sending connection request to {}", server_addr);
    send(
        &socket,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
        },
        server_addr,
    )
    .await?;

    let mut buf = [0u8; 65_536];
    let (len, _) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf)).await??;

    let client_id = match deserialize::<Packet>(&buf[..len])? {
        Packet::Connected { client_id } => client_id,
        Packet::Disconnected { reason } => {
            warn!("Connection refused: {}", reason);
            return Ok(());
        }
        other => {
            warn!("Expected Connected but got: {:?}", other);
            return Ok(());
        }
    };
    info!("Connection accepted with client ID: {}", client_id);

    let mut rng = rand::thread_rng();
    let mut steer = interval(Duration::from_millis(args.turn_interval.max(1)));
    let mut heartbeat = interval(Duration::from_secs(1));
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut best_score = 0;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,

            _ = steer.tick() => {
                let turn = random_turn(&mut rng);
                debug!("Steering {:?}", turn);
                send(&socket, &Packet::Turn { turn }, server_addr).await?;
            }

            _ = heartbeat.tick() => {
                send(&socket, &Packet::Heartbeat, server_addr).await?;
            }

            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match deserialize::<Packet>(&buf[..len]) {
                    Ok(Packet::Init { snake, players, food, .. }) => {
                        info!(
                            "Spawned as #{} at {:?} with {} players and {} food",
                            snake.display_number,
                            snake.head(),
                            players.len(),
                            food.len()
                        );
                    }
                    Ok(Packet::GameState { tick, players, .. }) => {
                        if let Some(me) = players.iter().find(|snake| snake.id == client_id) {
                            best_score = best_score.max(me.score);
                            debug!("Tick {}: length {}, score {}", tick, me.len(), me.score);
                        }
                    }
                    Ok(Packet::PlayerDied { client_id: id, score }) if id == client_id => {
                        info!("Died with score {}", score);
                    }
                    Ok(Packet::Countdown { seconds_remaining, .. }) => {
                        info!("Respawning in {}s", seconds_remaining);
                    }
                    Ok(Packet::Disconnected { reason }) => {
                        warn!("Disconnected by server: {}", reason);
                        return Ok(());
                    }
                    Ok(other) => debug!("Received {:?}", other),
                    Err(e) => warn!("Failed to deserialize packet: {}", e),
                }
            }
        }
    }

    info!("Sending disconnect request (best score {})", best_score);
    send(&socket, &Packet::Disconnect, server_addr).await?;

    Ok(())
}
