//! udprpc server library entry.
//!
//! This crate wires the UDP transport, dedup store, monitor registry,
//! dispatcher and the reference facility service into a runnable server.
//! It is consumed by the binaries (`udprpc-server`, `udprpc-client`) and by
//! integration tests.

pub mod app_state;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod history;
pub mod monitor;
pub mod obs;
pub mod services;
pub mod simulator;
pub mod transport;
