//! The request engine: per-endpoint mutual exclusion, rate limiting,
//! one-TCP-connection-per-request round trips, and the `ConnectionState`
//! transitions a caller observes on failure.
//!
//! Every call returns `Option<Vec<u8>>` rather than a `Result`: timeouts
//! and parse failures collapse to `None` plus a state transition, not an
//! error a caller has to match on. There is no persistent connection and
//! no asynchronous push stream to read alongside replies — each request
//! opens a fresh TCP connection, so a `Mutex`-guarded per-endpoint state
//! plus a direct blocking round trip is all the concurrency story needs.
//! Socket binding to a caller-supplied local address uses `socket2`,
//! since `std::net::TcpStream` has no pre-connect bind hook.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

use dtu_core::frame::{Frame, GCM_TAG_LEN};
use dtu_core::FrameError;

use crate::endpoint::{ConnectionState, DeviceEndpoint};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const RATE_LIMIT: Duration = Duration::from_secs(2);
const READ_BUF_LEN: usize = 1024;

struct EngineState {
    sequence: u16,
    last_request_completed_at: Option<Instant>,
    connection_state: ConnectionState,
}

impl EngineState {
    /// Bumps the sequence counter mod 2^16
    /// and returns the new value to use for this request.
    fn bump_sequence(&mut self) -> u16 {
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }
}

/// Serializes every outbound call to one `DeviceEndpoint` and enforces
/// the 2-second rate limit and 5-second connect/read timeouts.
pub struct RequestEngine {
    endpoint: DeviceEndpoint,
    state: Mutex<EngineState>,
}

impl RequestEngine {
    pub fn new(endpoint: DeviceEndpoint) -> Self {
        Self {
            endpoint,
            state: Mutex::new(EngineState {
                sequence: 0,
                last_request_completed_at: None,
                connection_state: ConnectionState::Unknown,
            }),
        }
    }

    pub fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| s.connection_state)
            .unwrap_or(ConnectionState::Unknown)
    }

    /// Run one standard-frame round trip. `payload` is the serialized
    /// request message; `encrypt_exempt` comes from the command
    /// catalog. Returns the decoded (and, if sealed, decrypted)
    /// response payload bytes, or `None` on any transport/framing/
    /// integrity/decode failure — never an `Err`.
    pub fn execute_standard(&self, command_id: u16, payload: &[u8], encrypt_exempt: bool) -> Option<Vec<u8>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        self.sleep_for_rate_limit(&mut state);
        let sequence = state.bump_sequence();

        let use_encryption = self.endpoint.is_encrypted() && !encrypt_exempt;

        let wire_payload = if use_encryption {
            let enc_rand = self.endpoint.enc_rand().expect("is_encrypted implies enc_rand is set");
            match dtu_core::crypto::seal(command_id, sequence, enc_rand, payload) {
                Ok(sealed) => sealed,
                Err(e) => {
                    log::debug!("seal failed for command {command_id:#06x}: {e}");
                    state.connection_state = ConnectionState::Unknown;
                    state.last_request_completed_at = Some(Instant::now());
                    return None;
                }
            }
        } else {
            payload.to_vec()
        };

        let tag_len = if use_encryption { GCM_TAG_LEN } else { 0 };
        let outbound = Frame::encode_standard(command_id, sequence, &wire_payload, tag_len);

        let round_trip = self.round_trip(&outbound);
        state.last_request_completed_at = Some(Instant::now());

        let raw = match round_trip {
            Ok(buf) => buf,
            Err(e) => {
                log::debug!("transport failure talking to {}: {e}", self.endpoint.target());
                state.connection_state = ConnectionState::Offline;
                return None;
            }
        };

        let decoded = match Frame::decode_standard(&raw, tag_len) {
            Ok(f) => f,
            Err(e) => {
                log::debug!("frame decode failed: {e}");
                state.connection_state = ConnectionState::Unknown;
                return None;
            }
        };

        let plaintext = if use_encryption {
            let enc_rand = self.endpoint.enc_rand().expect("is_encrypted implies enc_rand is set");
            match dtu_core::crypto::open(command_id, sequence, enc_rand, decoded.payload()) {
                Ok(p) => p,
                Err(e) => {
                    log::debug!("open failed: {e}");
                    state.connection_state = ConnectionState::Unknown;
                    return None;
                }
            }
        } else {
            decoded.payload().to_vec()
        };

        if plaintext.is_empty() {
            log::debug!("{}", FrameError::EmptyMessage);
            state.connection_state = ConnectionState::Unknown;
            return None;
        }

        state.connection_state = ConnectionState::Online;
        Some(plaintext)
    }

    /// Run one extended-frame round trip. Extended frames are never
    /// encrypted.
    pub fn execute_extended(&self, command_id: u16, dtu_serial_number: u64, number: u16, payload: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        self.sleep_for_rate_limit(&mut state);
        let sequence = state.bump_sequence();

        let outbound = Frame::encode_extended(command_id, sequence, dtu_serial_number, number, payload);

        let round_trip = self.round_trip(&outbound);
        state.last_request_completed_at = Some(Instant::now());

        let raw = match round_trip {
            Ok(buf) => buf,
            Err(e) => {
                log::debug!("transport failure talking to {}: {e}", self.endpoint.target());
                state.connection_state = ConnectionState::Offline;
                return None;
            }
        };

        let decoded = match Frame::decode_extended(&raw) {
            Ok(f) => f,
            Err(e) => {
                log::debug!("frame decode failed: {e}");
                state.connection_state = ConnectionState::Unknown;
                return None;
            }
        };

        if decoded.payload().is_empty() {
            log::debug!("{}", FrameError::EmptyMessage);
            state.connection_state = ConnectionState::Unknown;
            return None;
        }

        state.connection_state = ConnectionState::Online;
        Some(decoded.payload().to_vec())
    }

    fn sleep_for_rate_limit(&self, state: &mut EngineState) {
        let Some(last) = state.last_request_completed_at else {
            return;
        };
        let elapsed = last.elapsed();
        if elapsed < RATE_LIMIT {
            std::thread::sleep(RATE_LIMIT - elapsed);
        }
    }

    /// Opens a fresh TCP connection, writes `frame`, flushes, reads one
    /// reply of up to 1024 bytes, then closes the connection — on every
    /// exit path, success or failure.
    fn round_trip(&self, frame: &[u8]) -> io::Result<Vec<u8>> {
        let target = (self.endpoint.host(), self.endpoint.port()).to_socket_addrs()?;

        let mut last_err: Option<io::Error> = None;
        for addr in target {
            let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

            if let Some(local) = self.endpoint.local_addr() {
                socket.bind(&local.into())?;
            }

            match socket.connect_timeout(&addr.into(), CONNECT_TIMEOUT) {
                Ok(()) => {
                    socket.set_read_timeout(Some(READ_TIMEOUT))?;
                    socket.set_write_timeout(Some(READ_TIMEOUT))?;

                    let mut stream: TcpStream = socket.into();
                    let result = Self::write_and_read(&mut stream, frame);
                    let _ = stream.shutdown(std::net::Shutdown::Both);
                    return result;
                }
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no addresses resolved for host")))
    }

    fn write_and_read(stream: &mut TcpStream, frame: &[u8]) -> io::Result<Vec<u8>> {
        stream.write_all(frame)?;
        stream.flush()?;

        let mut buf = [0u8; READ_BUF_LEN];
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed before a reply was read"));
        }
        Ok(buf[..n].to_vec())
    }
}
