//! Transport layer (UDP).
//!
//! One socket carries requests, replies and monitor notifications. Each
//! datagram holds exactly one sealed frame; there is no fragmentation.

pub mod udp;

use std::net::SocketAddr;

use async_trait::async_trait;
use udprpc_core::error::Result;

pub use udp::UdpServer;

/// Somewhere to send a single datagram.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    async fn send_to(&self, frame: &[u8], target: SocketAddr) -> Result<()>;
}
