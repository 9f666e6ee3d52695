//! udprpc core: transport-agnostic wire primitives, error types, and the
//! envelope model.
//!
//! This crate defines the frame format and error surface shared by the
//! server runtime, the client, and test tooling. It carries no socket or
//! runtime dependencies so it can be reused in multiple contexts.
//!
//! Layers, leaves first:
//! - [`codec`]: big-endian byte writer/reader
//! - [`integrity`]: one-byte parity trailer
//! - [`marshal`]: schema-driven, cycle-safe object graph frames
//! - [`protocol`]: the request/response [`Envelope`] and [`Operation`] codes
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `RpcError`/`Result` so production
//! processes do not crash on malformed input or bad traffic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod codec;
pub mod error;
pub mod integrity;
pub mod marshal;
pub mod protocol;

/// Shared result type.
pub use error::{Result, RpcError, StatusCode};
pub use protocol::{Envelope, Operation};
