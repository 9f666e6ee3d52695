//! Retrying UDP client.
//!
//! Each call gets a fresh request id; retransmissions reuse it so an
//! at-most-once server answers them from its history instead of executing
//! twice. Replies carrying any other id are discarded.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use udprpc_core::error::{Result, RpcError};
use udprpc_core::marshal::Marshaller;
use udprpc_core::protocol::wire_marshaller;
use udprpc_core::{Envelope, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// How long to wait for a matching reply after each send.
    pub timeout: Duration,
    /// Total sends per call, the first one included.
    pub max_attempts: u32,
    pub max_datagram_bytes: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_attempts: 5,
            max_datagram_bytes: 65507,
        }
    }
}

pub struct RpcClient {
    socket: UdpSocket,
    server: SocketAddr,
    marshaller: Marshaller,
    next_id: AtomicI32,
    opts: ClientOptions,
}

impl RpcClient {
    pub async fn connect(server: SocketAddr) -> Result<Self> {
        Self::with_options(server, ClientOptions::default()).await
    }

    pub async fn with_options(server: SocketAddr, opts: ClientOptions) -> Result<Self> {
        let local: SocketAddr = if server.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self {
            socket,
            server,
            marshaller: wire_marshaller()?,
            next_id: AtomicI32::new(1),
            opts,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    pub fn next_request_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn call(&self, op: Operation, payload: &str) -> Result<Envelope> {
        self.call_with_id(op, self.next_request_id(), payload).await
    }

    /// Send with a caller-chosen id, retransmitting on timeout.
    pub async fn call_with_id(
        &self,
        op: Operation,
        request_id: i32,
        payload: &str,
    ) -> Result<Envelope> {
        let request = Envelope::new(op, request_id, payload);
        let frame = self.marshaller.encode_value(&request)?;

        for attempt in 1..=self.opts.max_attempts {
            self.socket.send_to(&frame, self.server).await?;
            if let Some(reply) = self.recv_reply(request_id).await? {
                return Ok(reply);
            }
            tracing::warn!(
                request_id,
                attempt,
                max = self.opts.max_attempts,
                "no reply, retrying"
            );
        }
        Err(RpcError::Io(format!(
            "request failed after {} attempts",
            self.opts.max_attempts
        )))
    }

    /// Send raw bytes once, no retries. Test and debugging aid.
    pub async fn send_raw(&self, frame: &[u8]) -> Result<()> {
        self.socket.send_to(frame, self.server).await?;
        Ok(())
    }

    /// Wait for the next decodable envelope, whatever its id.
    pub async fn recv_any(&self, wait: Duration) -> Result<Option<Envelope>> {
        let deadline = Instant::now() + wait;
        let mut buf = vec![0u8; self.opts.max_datagram_bytes];
        loop {
            let Some(frame) = self.recv_until(deadline, &mut buf).await? else {
                return Ok(None);
            };
            match self.marshaller.decode_value::<Envelope>(frame) {
                Ok(env) => return Ok(Some(env)),
                Err(e) => tracing::debug!(error = %e, "undecodable datagram ignored"),
            }
        }
    }

    /// Collect monitor notifications until `duration` has passed.
    pub async fn listen_notifications(&self, duration: Duration) -> Result<Vec<Envelope>> {
        let deadline = Instant::now() + duration;
        let mut buf = vec![0u8; self.opts.max_datagram_bytes];
        let mut notes = Vec::new();
        while let Some(frame) = self.recv_until(deadline, &mut buf).await? {
            match self.marshaller.decode_value::<Envelope>(frame) {
                Ok(env) if env.operation() == Operation::Monitor => {
                    tracing::info!(request_id = env.request_id(), "notification");
                    notes.push(env);
                }
                Ok(env) => tracing::debug!(%env, "non-notification ignored"),
                Err(e) => tracing::debug!(error = %e, "undecodable datagram ignored"),
            }
        }
        Ok(notes)
    }

    async fn recv_reply(&self, request_id: i32) -> Result<Option<Envelope>> {
        let deadline = Instant::now() + self.opts.timeout;
        let mut buf = vec![0u8; self.opts.max_datagram_bytes];
        while let Some(frame) = self.recv_until(deadline, &mut buf).await? {
            match self.marshaller.decode_value::<Envelope>(frame) {
                Ok(env) if env.request_id() == request_id => return Ok(Some(env)),
                Ok(env) => tracing::debug!(
                    expected = request_id,
                    got = env.request_id(),
                    "stale reply discarded"
                ),
                Err(e) => tracing::debug!(error = %e, "undecodable reply discarded"),
            }
        }
        Ok(None)
    }

    /// One datagram, or `None` once `deadline` passes.
    async fn recv_until<'b>(
        &self,
        deadline: Instant,
        buf: &'b mut [u8],
    ) -> Result<Option<&'b [u8]>> {
        match timeout_at(deadline, self.socket.recv_from(buf)).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok((n, _from))) => Ok(Some(&buf[..n])),
        }
    }
}
