//! Wire-level primitives for the DTU gateway transport: frame codec,
//! optional AES-128-GCM encryption, the command catalog, and the
//! generated protobuf message types. No networking lives here — see
//! the `dtu_client` crate for the request engine and typed client API.

pub mod catalog;
pub mod crypto;
pub mod error;
pub mod frame;
pub mod proto;

pub use catalog::{CommandDescriptor, EncryptionPolicy, FrameLayout, Paging};
pub use error::FrameError;
pub use frame::Frame;
