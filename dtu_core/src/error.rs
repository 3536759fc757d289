//! Framing/integrity/decode error taxonomy: the failure modes a caller
//! needs to distinguish when a frame fails to parse or authenticate.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame is too short to contain a header")]
    TooShort,

    #[error("unexpected magic header: {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("declared length {expected} does not match buffer length {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("CRC16 mismatch: expected {expected:#06x}, computed {got:#06x}")]
    BadCrc { expected: u16, got: u16 },

    #[error("AES-GCM authentication failed")]
    DecryptFailed,

    #[error("payload decode failed: {0}")]
    Decode(String),

    #[error("decoded message was empty")]
    EmptyMessage,
}
