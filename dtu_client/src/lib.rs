//! Typed client for Hoymiles-style DTU gateways.
//!
//! `dtu_client` layers the request engine (rate limiting, mutual
//! exclusion, transport-failure classification) and multi-page response
//! assembly on top of the wire-level codec in `dtu_core`, and exposes
//! them through [`DtuClient`]'s typed operation methods.

pub mod client;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod paging;

pub use client::{parse_serial_hex, DtuClient, FIRMWARE_DEFAULT_URL, TIME_OFFSET_SECONDS};
pub use endpoint::{ConnectionState, DeviceEndpoint, DEFAULT_PORT};
pub use engine::RequestEngine;
pub use error::ClientError;
pub use paging::PagedResponse;
