//! Synchronous, caller-side validation errors. Unlike transport/framing/
//! integrity/decode failures — which never bubble up as `Err` and
//! instead collapse to `None` plus a `ConnectionState` transition — a
//! validation failure is reported before any I/O is attempted and no
//! frame is ever emitted.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("power limit {0} out of range 0..=100")]
    InvalidPowerLimit(u32),

    #[error("economic working mode requires at least one tariff window")]
    MissingTariffWindows,

    #[error("invalid inverter serial number: {0}")]
    InvalidSerialNumber(String),
}
