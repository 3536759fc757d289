//! Generated protobuf message types for every payload this transport reads
//! or writes. The `.proto` sources live under `proto/` and are compiled by
//! `build.rs` via `prost-build`; this module just re-exports the generated
//! code under one path so the rest of the crate can `use crate::proto::*`.

#![allow(clippy::doc_markdown)]

include!(concat!(env!("OUT_DIR"), "/dtu.proto.rs"));
