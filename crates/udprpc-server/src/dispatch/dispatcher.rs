use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use udprpc_core::error::{Result, RpcError};
use udprpc_core::marshal::Marshaller;
use udprpc_core::{Envelope, Operation};

use crate::config::Semantics;
use crate::history::{Claim, InvocationHistory};
use crate::monitor::MonitorRegistry;
use crate::obs::RpcMetrics;
use crate::transport::DatagramSink;

/// What a handler sees besides the request itself.
pub struct CallContext<'a> {
    pub client: SocketAddr,
    pub monitors: &'a MonitorRegistry,
}

/// Reply payload plus the resource it changed, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    pub payload: String,
    pub mutated: Option<String>,
}

impl HandlerOutcome {
    pub fn reply(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            mutated: None,
        }
    }

    pub fn mutated(payload: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            mutated: Some(resource.into()),
        }
    }
}

/// Business logic riding on the envelope. Implementations own the payload
/// microformat; the dispatcher never parses it.
pub trait OperationHandler: Send + Sync {
    fn handle(&self, ctx: &CallContext<'_>, request: &Envelope) -> Result<HandlerOutcome>;

    /// Message pushed to subscribers after `resource` changed.
    fn status_snapshot(&self, resource: &str) -> Result<String>;
}

/// How a datagram was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Executed,
    Replayed,
    Echoed,
    Rejected,
    /// Duplicate of a request that has not finished executing.
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub reply: Envelope,
    pub disposition: Disposition,
}

/// Decode, dedup, invoke, record, notify.
pub struct Dispatcher {
    marshaller: Marshaller,
    semantics: Semantics,
    history: Arc<InvocationHistory>,
    monitors: Arc<MonitorRegistry>,
    handler: Arc<dyn OperationHandler>,
    metrics: Arc<RpcMetrics>,
}

impl Dispatcher {
    pub fn new(
        marshaller: Marshaller,
        semantics: Semantics,
        history: Arc<InvocationHistory>,
        monitors: Arc<MonitorRegistry>,
        handler: Arc<dyn OperationHandler>,
        metrics: Arc<RpcMetrics>,
    ) -> Self {
        Self {
            marshaller,
            semantics,
            history,
            monitors,
            handler,
            metrics,
        }
    }

    pub fn semantics(&self) -> Semantics {
        self.semantics
    }

    pub fn marshaller(&self) -> &Marshaller {
        &self.marshaller
    }

    pub fn history(&self) -> &InvocationHistory {
        &self.history
    }

    pub fn monitors(&self) -> &MonitorRegistry {
        &self.monitors
    }

    /// Process one datagram and return the encoded reply frame.
    pub async fn handle_datagram(
        &self,
        frame: &[u8],
        client: SocketAddr,
        sink: &dyn DatagramSink,
    ) -> Result<Bytes> {
        let dispatched = self.dispatch(frame, client, sink).await;
        self.marshaller.encode_value(&dispatched.reply)
    }

    /// Process one datagram into a reply envelope. Notifications for a
    /// mutating request go out through `sink` before this returns.
    pub async fn dispatch(
        &self,
        frame: &[u8],
        client: SocketAddr,
        sink: &dyn DatagramSink,
    ) -> Dispatched {
        let started = Instant::now();

        let request: Envelope = match self.marshaller.decode_value(frame) {
            Ok(env) => env,
            Err(e) => {
                let code = e.status_code().as_str();
                self.metrics.decode_errors.inc(&[("code", code)]);
                if e.is_decode_error() {
                    tracing::warn!(%client, code, error = %e, "undecodable datagram");
                } else {
                    tracing::error!(%client, code, error = %e, "decode failed unexpectedly");
                }
                return Dispatched {
                    reply: Envelope::new(
                        Operation::Read,
                        0,
                        format!("status:ERROR\nmessage:Bad request: {e}"),
                    ),
                    disposition: Disposition::Rejected,
                };
            }
        };

        let op = request.operation();
        let op_label = op.as_str();
        self.metrics.requests.inc(&[("op", op_label)]);
        tracing::info!(%client, request_id = request.request_id(), %op, "request");

        if op == Operation::Echo {
            return Dispatched {
                reply: request,
                disposition: Disposition::Echoed,
            };
        }

        if self.semantics == Semantics::AtMostOnce {
            match self.history.claim(&request, client) {
                Claim::Fresh => {}
                Claim::Done(reply) => {
                    self.metrics.replays.inc(&[("op", op_label)]);
                    tracing::info!(
                        %client,
                        request_id = request.request_id(),
                        %op,
                        "duplicate, replaying cached reply"
                    );
                    return Dispatched {
                        reply,
                        disposition: Disposition::Replayed,
                    };
                }
                Claim::InFlight => {
                    tracing::info!(
                        %client,
                        request_id = request.request_id(),
                        %op,
                        "duplicate of a request still executing"
                    );
                    return Dispatched {
                        reply: request.reply("status:ERROR\nmessage:Request in progress"),
                        disposition: Disposition::InProgress,
                    };
                }
            }
        } else {
            self.history.begin(&request, client);
        }
        let ctx = CallContext {
            client,
            monitors: &self.monitors,
        };
        let (reply, mutated) = match self.handler.handle(&ctx, &request) {
            Ok(outcome) => (request.reply(outcome.payload), outcome.mutated),
            Err(e) => {
                self.metrics.handler_errors.inc(&[("op", op_label)]);
                tracing::debug!(
                    %client,
                    request_id = request.request_id(),
                    %op,
                    error = %e,
                    "handler error"
                );
                (request.reply(error_payload(&e)), None)
            }
        };
        self.history.record(&request, client, &reply);

        if op.is_mutating() {
            if let Some(resource) = mutated {
                self.notify(sink, &resource).await;
            }
        }

        self.metrics
            .dispatch_duration
            .observe(&[("op", op_label)], started.elapsed());
        Dispatched {
            reply,
            disposition: Disposition::Executed,
        }
    }

    async fn notify(&self, sink: &dyn DatagramSink, resource: &str) {
        self.monitors.sweep_expired();
        let message = match self.handler.status_snapshot(resource) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(%resource, error = %e, "no snapshot, notification skipped");
                return;
            }
        };
        let report = self
            .monitors
            .publish(sink, &self.marshaller, resource, &message)
            .await;
        self.metrics
            .notifications
            .add(&[("result", "sent")], report.sent as u64);
        self.metrics
            .notifications
            .add(&[("result", "failed")], report.failed as u64);
        if report.sent + report.failed > 0 {
            tracing::info!(
                %resource,
                sent = report.sent,
                failed = report.failed,
                "subscribers notified"
            );
        }
    }
}

fn error_payload(e: &RpcError) -> String {
    format!("status:ERROR\nmessage:{e}")
}
