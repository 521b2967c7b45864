//! Wake-on-LAN support
//!
//! Sleeping hosts are woken by sending a magic packet to their MAC address
//! over broadcast UDP before any remote command can reach them.

use std::fmt;
use std::net::UdpSocket;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors related to Wake-on-LAN operations
#[derive(Debug, Error)]
pub enum WolError {
    /// The MAC address string could not be parsed
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    /// The UDP socket could not be created or configured
    #[error("failed to set up UDP socket: {0}")]
    Socket(String),

    /// The magic packet could not be sent
    #[error("failed to send magic packet: {0}")]
    Send(String),
}

/// Result type alias for WOL operations
pub type WolResult<T> = std::result::Result<T, WolError>;

/// UDP port the magic packet is sent to (discard protocol)
pub const DEFAULT_WOL_PORT: u16 = 9;

/// Broadcast address used when the network does not need a directed one
pub const DEFAULT_BROADCAST_ADDRESS: &str = "255.255.255.255";

/// Magic packet size: 6 bytes of 0xFF + 16 repetitions of the 6-byte MAC
pub const MAGIC_PACKET_SIZE: usize = 6 + (16 * 6);

/// A 6-byte hardware address identifying the interface to wake
///
/// Parses from colon- or dash-separated hex (`AA:BB:CC:DD:EE:FF`),
/// serializes as the colon form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Creates a `MacAddress` from raw bytes
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the MAC address
    #[must_use]
    pub const fn bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl FromStr for MacAddress {
    type Err = WolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let separator = if trimmed.contains(':') {
            ':'
        } else if trimmed.contains('-') {
            '-'
        } else {
            return Err(WolError::InvalidMac(format!(
                "'{trimmed}' has no ':' or '-' separator"
            )));
        };

        let parts: Vec<&str> = trimmed.split(separator).collect();
        if parts.len() != 6 {
            return Err(WolError::InvalidMac(format!(
                "expected 6 octets, found {}",
                parts.len()
            )));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| WolError::InvalidMac(format!("bad octet '{part}'")))?;
        }

        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl TryFrom<String> for MacAddress {
    type Error = WolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Builds the magic packet for the given MAC address
///
/// Layout: a synchronization stream of 6 `0xFF` bytes followed by the
/// target MAC repeated 16 times, 102 bytes total.
#[must_use]
pub fn magic_packet(mac: &MacAddress) -> [u8; MAGIC_PACKET_SIZE] {
    let mut packet = [0u8; MAGIC_PACKET_SIZE];
    packet[..6].fill(0xFF);

    let mac_bytes = mac.bytes();
    for repetition in 0..16 {
        let offset = 6 + repetition * 6;
        packet[offset..offset + 6].copy_from_slice(mac_bytes);
    }

    packet
}

/// Sends a magic packet to wake a sleeping machine
///
/// The packet has no delivery confirmation; a successful return only means
/// it left this machine.
///
/// # Errors
/// Returns an error if the socket cannot be created or the packet cannot
/// be sent.
pub fn send_magic_packet(mac: &MacAddress, broadcast: &str, port: u16) -> WolResult<()> {
    let packet = magic_packet(mac);

    let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| WolError::Socket(e.to_string()))?;
    socket
        .set_broadcast(true)
        .map_err(|e| WolError::Socket(e.to_string()))?;

    socket
        .send_to(&packet, format!("{broadcast}:{port}"))
        .map_err(|e| WolError::Send(e.to_string()))?;

    Ok(())
}
