//! Wake-on-LAN magic packets.
//!
//! Packet layout: six `0xFF` bytes followed by the target MAC repeated
//! sixteen times, sent over UDP broadcast to port 9.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::validate::{self, ValidationError};

use super::net;

const WOL_PORT: u16 = 9;
const BROADCAST_ADDR: &str = "255.255.255.255";

/// Interval between reachability polls while waiting for a woken host.
pub const WAKE_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum WolError {
    #[error(transparent)]
    InvalidMac(#[from] ValidationError),

    #[error("magic packet send failed: {0}")]
    Send(#[from] std::io::Error),
}

/// Builds the 102-byte magic packet for a MAC given in any common notation.
pub fn magic_packet(mac: &str) -> Result<Vec<u8>, WolError> {
    let mac = validate::parse_mac(mac)?;
    let mut packet = Vec::with_capacity(102);
    packet.extend_from_slice(&[0xFF; 6]);
    for _ in 0..16 {
        packet.extend_from_slice(&mac);
    }
    Ok(packet)
}

/// Broadcasts the magic packet for `mac`.
pub async fn send_magic_packet(mac: &str) -> Result<(), WolError> {
    let packet = magic_packet(mac)?;
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.set_broadcast(true)?;
    socket.send_to(&packet, (BROADCAST_ADDR, WOL_PORT)).await?;
    info!("magic packet sent for {}", mac);
    Ok(())
}

/// Polls ping and the service port every [`WAKE_POLL_INTERVAL`] until both
/// answer or the deadline passes. Returns whether the host came up.
pub async fn wait_until_awake(host: &str, port: u16, deadline: Duration) -> bool {
    let give_up = Instant::now() + deadline;
    loop {
        let online = net::ping(host, 1, net::DEFAULT_PING_TIMEOUT).await;
        let service = net::tcp_check(host, port, net::DEFAULT_TCP_TIMEOUT).await;
        debug!(
            "wake poll {}:{} net={} service={}",
            host, port, online, service
        );
        if online && service {
            return true;
        }
        if Instant::now() >= give_up {
            return false;
        }
        sleep(WAKE_POLL_INTERVAL).await;
    }
}
