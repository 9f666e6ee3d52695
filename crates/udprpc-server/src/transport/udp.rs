//! The receive/process/reply loop.
//!
//! One datagram is processed end to end before the next is read. The reply
//! is sent only after the dispatcher has recorded it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use udprpc_core::error::Result;

use crate::app_state::AppState;
use crate::transport::DatagramSink;

#[async_trait]
impl DatagramSink for UdpSocket {
    async fn send_to(&self, frame: &[u8], target: SocketAddr) -> Result<()> {
        UdpSocket::send_to(self, frame, target).await?;
        Ok(())
    }
}

pub struct UdpServer {
    socket: Arc<UdpSocket>,
    state: AppState,
}

impl UdpServer {
    /// Bind `server.listen` from the state's config.
    pub async fn bind(state: AppState) -> Result<Self> {
        let listen = state.cfg().server.listen_addr()?;
        let socket = UdpSocket::bind(listen).await?;
        Ok(Self {
            socket: Arc::new(socket),
            state,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        let max = self.state.cfg().server.max_datagram_bytes;
        let mut buf = vec![0u8; max];

        tracing::info!(
            addr = %self.local_addr()?,
            semantics = self.state.cfg().server.semantics.as_str(),
            "udp server listening"
        );

        loop {
            let (len, client) = tokio::select! {
                _ = &mut shutdown => break,
                r = self.socket.recv_from(&mut buf) => match r {
                    Ok(v) => v,
                    Err(e) => {
                        // e.g. ICMP port unreachable surfacing on some platforms
                        tracing::warn!(error = %e, "recv failed");
                        continue;
                    }
                },
            };
            if len == max {
                tracing::debug!(%client, len, "datagram filled the receive buffer");
            }
            self.process(&buf[..len], client).await;
        }

        tracing::info!("udp server stopped");
        Ok(())
    }

    async fn process(&self, frame: &[u8], client: SocketAddr) {
        let simulator = self.state.simulator();
        if simulator.should_drop() {
            self.state.metrics().simulated_drops.inc(&[]);
            tracing::info!(%client, "simulated drop");
            return;
        }
        let delay = simulator.delay();
        if !delay.is_zero() {
            tracing::debug!(
                %client,
                delay_ms = delay.as_millis() as u64,
                "simulated slow processing"
            );
            tokio::time::sleep(delay).await;
        }

        let dispatcher = self.state.dispatcher();
        let reply = match dispatcher
            .handle_datagram(frame, client, &*self.socket)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(%client, error = %e, "reply encoding failed");
                return;
            }
        };

        if reply.len() > self.state.cfg().server.max_datagram_bytes {
            tracing::warn!(%client, len = reply.len(), "reply exceeds max_datagram_bytes");
        }
        if let Err(e) = self.socket.send_to(&reply, client).await {
            tracing::warn!(%client, error = %e, "reply send failed");
        }
    }
}
