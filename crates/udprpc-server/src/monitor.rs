//! Notification registry: time-bounded subscriptions to resource changes.
//!
//! Records age out lazily. Nothing runs on a timer; the dispatcher sweeps
//! expired records right before it publishes a change.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use udprpc_core::marshal::Marshaller;
use udprpc_core::{Envelope, Operation};

use crate::transport::DatagramSink;

/// One client's subscription to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorRecord {
    pub resource: String,
    /// Id of the MONITOR request; notifications carry it back.
    pub request_id: i32,
    pub client: SocketAddr,
    pub created_at: Instant,
    pub interval: Duration,
}

impl MonitorRecord {
    pub fn new(
        resource: impl Into<String>,
        request_id: i32,
        client: SocketAddr,
        interval: Duration,
    ) -> Self {
        Self {
            resource: resource.into(),
            request_id,
            client,
            created_at: Instant::now(),
            interval,
        }
    }

    /// Expired once strictly more than `interval` has passed.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.interval
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub sent: usize,
    pub failed: usize,
}

/// `resource -> records`, shared between the dispatcher and handlers.
#[derive(Default)]
pub struct MonitorRegistry {
    records: DashMap<String, Vec<MonitorRecord>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends unconditionally; the same client may hold several records.
    pub fn register(&self, record: MonitorRecord) {
        tracing::debug!(
            resource = %record.resource,
            client = %record.client,
            interval_s = record.interval.as_secs(),
            "monitor registered"
        );
        self.records
            .entry(record.resource.clone())
            .or_insert_with(Vec::new)
            .push(record);
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    /// Drop every record expired at `now`; returns how many went.
    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut removed = 0;
        self.records.retain(|_, list| {
            let before = list.len();
            list.retain(|r| !r.is_expired_at(now));
            removed += before - list.len();
            !list.is_empty()
        });
        if removed > 0 {
            tracing::debug!(removed, "expired monitors swept");
        }
        removed
    }

    /// Live records for `resource` at `now`.
    pub fn live_at(&self, resource: &str, now: Instant) -> Vec<MonitorRecord> {
        self.records
            .get(resource)
            .map(|list| {
                list.iter()
                    .filter(|r| !r.is_expired_at(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn live(&self, resource: &str) -> Vec<MonitorRecord> {
        self.live_at(resource, Instant::now())
    }

    /// Total records held, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.records.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push `message` to every live subscriber of `resource`.
    ///
    /// Each datagram is independent: a failed send is logged and counted,
    /// the rest still go out.
    pub async fn publish(
        &self,
        sink: &dyn DatagramSink,
        marshaller: &Marshaller,
        resource: &str,
        message: &str,
    ) -> PublishReport {
        // snapshot first; no map guard is held across an await
        let targets = self.live(resource);
        let mut report = PublishReport::default();

        for record in targets {
            let note = Envelope::new(Operation::Monitor, record.request_id, message);
            let result = match marshaller.encode_value(&note) {
                Ok(frame) => sink.send_to(&frame, record.client).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        client = %record.client,
                        %resource,
                        error = %e,
                        "notification failed"
                    );
                }
            }
        }
        report
    }
}
