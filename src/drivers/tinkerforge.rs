//! Minimal Tinkerforge TCP/IP protocol client for the Analog In 3.0 bricklet.
//!
//! Only what the collector needs: connect to brickd, address one bricklet by its base58 UID
//! and call `get_voltage`. Callback packets arriving on the socket are skipped.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info};

use crate::drivers::{SourceError, VoltageSource};

pub const DEFAULT_PORT: u16 = 4223;

const HEADER_LEN: usize = 8;
const FUNCTION_GET_VOLTAGE: u8 = 1;
const RESPONSE_EXPECTED: u8 = 0x08;
/// Unrelated packets tolerated while waiting for one response.
const MAX_SKIPPED_PACKETS: usize = 64;
const BASE58_ALPHABET: &[u8] = b"123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Decodes a bricklet UID such as `27eU` into its numeric form.
pub fn decode_uid(uid: &str) -> Result<u32, SourceError> {
    let invalid = || SourceError::InvalidUid(uid.to_owned());
    if uid.is_empty() {
        return Err(invalid());
    }
    let mut value: u64 = 0;
    for byte in uid.bytes() {
        let digit = BASE58_ALPHABET
            .iter()
            .position(|&c| c == byte)
            .ok_or_else(invalid)?;
        value = value
            .checked_mul(58)
            .and_then(|v| v.checked_add(digit as u64))
            .ok_or_else(invalid)?;
    }
    let uid32 = match u32::try_from(value) {
        Ok(v) => v,
        Err(_) => fold_uid64(value),
    };
    if uid32 == 0 {
        return Err(invalid());
    }
    Ok(uid32)
}

/// Maps a 64-bit UID onto the 32-bit wire form.
fn fold_uid64(uid: u64) -> u32 {
    let low = (uid & 0xFFFF_FFFF) as u32;
    let high = (uid >> 32) as u32;
    (low & 0x0000_0FFF)
        | (low & 0x0F00_0000) >> 12
        | (high & 0x0000_003F) << 16
        | (high & 0x000F_0000) << 6
        | (high & 0x3F00_0000) << 2
}

fn encode_header(uid: u32, length: u8, function_id: u8, sequence: u8) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&uid.to_le_bytes());
    header[4] = length;
    header[5] = function_id;
    header[6] = (sequence << 4) | RESPONSE_EXPECTED;
    header
}

/// Analog In 3.0 bricklet reached through a brickd daemon.
pub struct TinkerforgeSource {
    stream: Option<TcpStream>,
    addr: String,
    uid: u32,
    uid_text: String,
    sequence: u8,
}

impl TinkerforgeSource {
    pub fn connect(
        host: &str,
        port: u16,
        uid: &str,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let uid_number = decode_uid(uid)?;
        let addr = format!("{host}:{port}");
        let connection_error = |source| SourceError::Connection {
            addr: addr.clone(),
            source,
        };
        let socket = addr
            .to_socket_addrs()
            .map_err(connection_error)?
            .next()
            .ok_or_else(|| {
                connection_error(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "host did not resolve",
                ))
            })?;
        let stream = TcpStream::connect_timeout(&socket, timeout).map_err(connection_error)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        info!("Connected to Tinkerforge at {addr}, reading Analog In {uid}");
        Ok(Self {
            stream: Some(stream),
            addr,
            uid: uid_number,
            uid_text: uid.to_owned(),
            sequence: 0,
        })
    }

    fn next_sequence(&mut self) -> u8 {
        self.sequence = self.sequence % 15 + 1;
        self.sequence
    }

    /// Sends a payload-less request and returns the payload of its response.
    fn request(&mut self, function_id: u8) -> Result<Vec<u8>, SourceError> {
        let sequence = self.next_sequence();
        let uid = self.uid;
        let stream = self.stream.as_mut().ok_or(SourceError::Disconnected)?;
        stream.write_all(&encode_header(uid, HEADER_LEN as u8, function_id, sequence))?;

        for _ in 0..MAX_SKIPPED_PACKETS {
            let mut header = [0u8; HEADER_LEN];
            stream.read_exact(&mut header)?;
            let length = header[4] as usize;
            if length < HEADER_LEN {
                return Err(SourceError::Protocol(format!("packet length {length}")));
            }
            let mut payload = vec![0u8; length - HEADER_LEN];
            stream.read_exact(&mut payload)?;

            let packet_uid = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let packet_sequence = header[6] >> 4;
            if packet_sequence == 0
                || packet_uid != uid
                || header[5] != function_id
                || packet_sequence != sequence
            {
                debug!(
                    "skipping packet uid={packet_uid} fid={} seq={packet_sequence}",
                    header[5]
                );
                continue;
            }
            let error_code = header[7] >> 6;
            if error_code != 0 {
                return Err(SourceError::Device(error_code));
            }
            return Ok(payload);
        }
        Err(SourceError::Protocol(format!(
            "no response to function {function_id} after {MAX_SKIPPED_PACKETS} packets"
        )))
    }
}

impl VoltageSource for TinkerforgeSource {
    fn read_millivolts(&mut self) -> Result<f64, SourceError> {
        let payload = self.request(FUNCTION_GET_VOLTAGE)?;
        match payload.as_slice() {
            [lo, hi, ..] => Ok(f64::from(u16::from_le_bytes([*lo, *hi]))),
            _ => Err(SourceError::Protocol(format!(
                "get_voltage payload of {} bytes",
                payload.len()
            ))),
        }
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.shutdown(Shutdown::Both).ok();
            info!("Disconnected from {}.", self.addr);
        }
    }

    fn describe(&self) -> String {
        format!("Analog In 3.0 {} at {}", self.uid_text, self.addr)
    }
}

impl Drop for TinkerforgeSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}
