//! Wire framing for the two frame layouts this protocol uses: a tagged
//! `Frame::Standard` / `Frame::Extended` enum rather than a trait
//! hierarchy, since the two layouts share no behavior beyond encode/decode.
//!
//! Standard frame, all integers big-endian:
//!
//! ```text
//! magic(4) | command_id(2) | sequence(2) | crc16(2) | length(2) | payload
//! ```
//!
//! `length` is the total on-wire frame length. The CRC covers the payload
//! region only (everything after the length field), but EXCLUDES a
//! trailing AES-GCM tag when the payload is encrypted. See dtu_core::crypto
//! for why: the tag is authentication data bolted onto ciphertext, not part
//! of the framed message the legacy CRC was designed to protect.
//!
//! Extended frame (DTU-serial-addressed, never encrypted):
//!
//! ```text
//! magic(4) | command_id(2) | sequence(2) | crc16(2) | length(2) | sub_header(2) | dtu_sn(8) | reserved(2) | number(2) | payload
//! ```
//!
//! `length` is again the total on-wire frame length; the CRC covers only
//! the `number` field plus the payload (bytes 24 onward) — the sub-header
//! and DTU serial number ahead of that are fixed addressing metadata, not
//! measured.

use crate::error::FrameError;

pub const MAGIC: [u8; 4] = [0x48, 0x4D, 0xA3, 0x03];
pub const EXTENDED_SUB_HEADER: u16 = 0x000E;
pub const GCM_TAG_LEN: usize = 16;

const STANDARD_HEADER_LEN: usize = 4 + 2 + 2 + 2 + 2;
/// Bytes before the CRC/length-measured region in an extended frame:
/// magic + command + sequence + crc + length + sub_header + dtu_sn + reserved.
/// The trailing `number` field and the payload are what CRC/length cover.
const EXTENDED_ADDR_LEN: usize = 4 + 2 + 2 + 2 + 2 + 2 + 8 + 2;

/// CRC16/MODBUS: poly 0x8005 reflected (0xA001), init 0xFFFF, no xorout.
/// Matches `crc::CRC_16_MODBUS` from the `crc` crate's built-in catalog;
/// this free function exists so callers don't need to depend on `crc`
/// directly and so the exact table is pinned in one place.
pub fn crc16_modbus(data: &[u8]) -> u16 {
    const ALGO: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);
    ALGO.checksum(data)
}

/// A decoded frame, still holding its raw (possibly encrypted) payload
/// bytes. Callers pass the payload through `dtu_core::crypto` before
/// decoding it as a protobuf message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Standard {
        command_id: u16,
        sequence: u16,
        payload: Vec<u8>,
    },
    Extended {
        command_id: u16,
        sequence: u16,
        dtu_serial_number: u64,
        number: u16,
        payload: Vec<u8>,
    },
}

impl Frame {
    pub fn command_id(&self) -> u16 {
        match self {
            Frame::Standard { command_id, .. } => *command_id,
            Frame::Extended { command_id, .. } => *command_id,
        }
    }

    pub fn sequence(&self) -> u16 {
        match self {
            Frame::Standard { sequence, .. } => *sequence,
            Frame::Extended { sequence, .. } => *sequence,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Standard { payload, .. } => payload,
            Frame::Extended { payload, .. } => payload,
        }
    }

    /// Encode a standard frame. `payload` is the final wire payload,
    /// already including a trailing GCM tag if `tag_len > 0`. The declared
    /// length is the total on-wire frame length; the CRC covers the
    /// payload region only, excluding the trailing tag.
    pub fn encode_standard(command_id: u16, sequence: u16, payload: &[u8], tag_len: usize) -> Vec<u8> {
        let crc_region_len = payload.len() - tag_len;
        let crc = crc16_modbus(&payload[..crc_region_len]);
        let length = (STANDARD_HEADER_LEN + payload.len()) as u16;

        let mut out = Vec::with_capacity(STANDARD_HEADER_LEN + payload.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&command_id.to_be_bytes());
        out.extend_from_slice(&sequence.to_be_bytes());
        out.extend_from_slice(&crc.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    /// Decode a standard frame. `tag_len` must match what the caller
    /// expects to find trailing the CRC-covered region (0 if the command
    /// is encryption-exempt or encryption is disabled, 16 otherwise).
    pub fn decode_standard(buf: &[u8], tag_len: usize) -> Result<Frame, FrameError> {
        if buf.len() < STANDARD_HEADER_LEN {
            return Err(FrameError::TooShort);
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if magic != MAGIC {
            return Err(FrameError::BadMagic(magic));
        }

        let command_id = u16::from_be_bytes([buf[4], buf[5]]);
        let sequence = u16::from_be_bytes([buf[6], buf[7]]);
        let crc_declared = u16::from_be_bytes([buf[8], buf[9]]);
        let length = u16::from_be_bytes([buf[10], buf[11]]) as usize;

        if buf.len() != length {
            return Err(FrameError::LengthMismatch {
                expected: length,
                got: buf.len(),
            });
        }

        let body = &buf[STANDARD_HEADER_LEN..];
        if body.len() < tag_len {
            return Err(FrameError::TooShort);
        }

        let crc_region_len = body.len() - tag_len;
        let crc_computed = crc16_modbus(&body[..crc_region_len]);
        if crc_computed != crc_declared {
            return Err(FrameError::BadCrc {
                expected: crc_declared,
                got: crc_computed,
            });
        }

        Ok(Frame::Standard {
            command_id,
            sequence,
            payload: body.to_vec(),
        })
    }

    /// Encode an extended frame. Extended frames are never encrypted.
    /// The CRC and declared length cover the `number`
    /// field plus the payload (bytes from offset 24 onward); the fixed
    /// sub-header and DTU serial number ahead of that are not measured.
    pub fn encode_extended(command_id: u16, sequence: u16, dtu_serial_number: u64, number: u16, payload: &[u8]) -> Vec<u8> {
        let mut measured = Vec::with_capacity(2 + payload.len());
        measured.extend_from_slice(&number.to_be_bytes());
        measured.extend_from_slice(payload);

        let crc = crc16_modbus(&measured);
        let length = (EXTENDED_ADDR_LEN + measured.len()) as u16;

        let mut out = Vec::with_capacity(EXTENDED_ADDR_LEN + measured.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&command_id.to_be_bytes());
        out.extend_from_slice(&sequence.to_be_bytes());
        out.extend_from_slice(&crc.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&EXTENDED_SUB_HEADER.to_be_bytes());
        out.extend_from_slice(&dtu_serial_number.to_be_bytes());
        out.extend_from_slice(&[0u8, 0u8]); // reserved
        out.extend_from_slice(&measured);
        out
    }

    pub fn decode_extended(buf: &[u8]) -> Result<Frame, FrameError> {
        if buf.len() < EXTENDED_ADDR_LEN + 2 {
            return Err(FrameError::TooShort);
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);
        if magic != MAGIC {
            return Err(FrameError::BadMagic(magic));
        }

        let command_id = u16::from_be_bytes([buf[4], buf[5]]);
        let sequence = u16::from_be_bytes([buf[6], buf[7]]);
        let crc_declared = u16::from_be_bytes([buf[8], buf[9]]);
        let length = u16::from_be_bytes([buf[10], buf[11]]) as usize;
        // sub_header at buf[12..14] is not currently validated beyond presence.
        let mut sn_bytes = [0u8; 8];
        sn_bytes.copy_from_slice(&buf[14..22]);
        let dtu_serial_number = u64::from_be_bytes(sn_bytes);
        // reserved at buf[22..24]

        if buf.len() != length {
            return Err(FrameError::LengthMismatch {
                expected: length,
                got: buf.len(),
            });
        }

        let measured = &buf[EXTENDED_ADDR_LEN..];
        let crc_computed = crc16_modbus(measured);
        if crc_computed != crc_declared {
            return Err(FrameError::BadCrc {
                expected: crc_declared,
                got: crc_computed,
            });
        }

        let number = u16::from_be_bytes([measured[0], measured[1]]);
        let payload = measured[2..].to_vec();

        Ok(Frame::Extended {
            command_id,
            sequence,
            dtu_serial_number,
            number,
            payload,
        })
    }

    /// Decode either frame layout, dispatching on `extended` rather than
    /// sniffing the bytes — the layout is a property of the command (see
    /// `dtu_core::catalog`), known to the caller before any bytes arrive.
    pub fn decode(buf: &[u8], extended: bool, tag_len: usize) -> Result<Frame, FrameError> {
        if extended {
            Frame::decode_extended(buf)
        } else {
            Frame::decode_standard(buf, tag_len)
        }
    }
}
