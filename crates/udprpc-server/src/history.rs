//! Invocation history: the dedup store behind at-most-once semantics.
//!
//! Keyed by `(request id, client address)`. Unbounded by default; with a
//! positive cap the oldest inserted record is evicted first, and a
//! retransmission of an evicted request executes again.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use udprpc_core::Envelope;

type Key = (i32, SocketAddr);

/// One remembered invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRecord {
    pub request: Envelope,
    pub client: SocketAddr,
    /// Absent until the handler has produced an outcome.
    pub response: Option<Envelope>,
}

/// What the store already knows about an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// First sighting; the caller now owns its execution.
    Fresh,
    /// Same key is still executing.
    InFlight,
    /// Already answered; replay this.
    Done(Envelope),
}

#[derive(Default)]
pub struct InvocationHistory {
    records: DashMap<Key, InvocationRecord>,
    order: Mutex<VecDeque<Key>>,
    max_entries: usize,
}

impl InvocationHistory {
    /// `max_entries == 0` keeps everything.
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    pub fn lookup(&self, request_id: i32, client: SocketAddr) -> Option<InvocationRecord> {
        self.records
            .get(&(request_id, client))
            .map(|r| r.value().clone())
    }

    /// Check and mark in one step: a vacant key is recorded as in flight,
    /// an occupied one is reported as it stands.
    pub fn claim(&self, request: &Envelope, client: SocketAddr) -> Claim {
        let key = (request.request_id(), client);
        let claim = match self.records.entry(key) {
            Entry::Occupied(e) => match &e.get().response {
                Some(reply) => Claim::Done(reply.clone()),
                None => Claim::InFlight,
            },
            Entry::Vacant(v) => {
                v.insert(InvocationRecord {
                    request: request.clone(),
                    client,
                    response: None,
                });
                Claim::Fresh
            }
        };
        if claim == Claim::Fresh {
            self.track(key);
        }
        claim
    }

    /// Note a freshly decoded request; its response is still absent.
    pub fn begin(&self, request: &Envelope, client: SocketAddr) {
        self.insert(InvocationRecord {
            request: request.clone(),
            client,
            response: None,
        });
    }

    /// Store the outcome of a request.
    pub fn record(&self, request: &Envelope, client: SocketAddr, response: &Envelope) {
        self.insert(InvocationRecord {
            request: request.clone(),
            client,
            response: Some(response.clone()),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&self, record: InvocationRecord) {
        let key = (record.request.request_id(), record.client);
        if self.records.insert(key, record).is_none() {
            self.track(key);
        }
    }

    /// Queue a newly inserted key for FIFO eviction. No map guard may be
    /// held by the caller.
    fn track(&self, key: Key) {
        if self.max_entries == 0 {
            return;
        }
        let mut order = match self.order.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        order.push_back(key);
        while order.len() > self.max_entries {
            if let Some(old) = order.pop_front() {
                self.records.remove(&old);
                tracing::debug!(request_id = old.0, client = %old.1, "history entry evicted");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use udprpc_core::Operation;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 1], port))
    }

    #[test]
    fn key_includes_client_port() {
        let h = InvocationHistory::new(0);
        let req = Envelope::new(Operation::Read, 7, "facility,ALL");
        h.record(&req, addr(1000), &req.reply("R"));

        assert_eq!(h.lookup(7, addr(1000)).unwrap().response.unwrap().payload(), "R");
        assert!(h.lookup(7, addr(1001)).is_none());
        assert!(h.lookup(8, addr(1000)).is_none());
    }

    #[test]
    fn begin_then_record_completes_one_entry() {
        let h = InvocationHistory::new(0);
        let req = Envelope::new(Operation::Write, 2, "x");
        h.begin(&req, addr(1));
        assert_eq!(h.lookup(2, addr(1)).unwrap().response, None);
        h.record(&req, addr(1), &req.reply("ok"));
        assert_eq!(h.len(), 1);
        assert!(h.lookup(2, addr(1)).unwrap().response.is_some());
    }

    #[test]
    fn claim_reports_in_flight_and_done() {
        let h = InvocationHistory::new(0);
        let req = Envelope::new(Operation::Write, 5, "x");

        assert_eq!(h.claim(&req, addr(1)), Claim::Fresh);
        assert_eq!(h.claim(&req, addr(1)), Claim::InFlight);
        assert_eq!(h.claim(&req, addr(2)), Claim::Fresh);

        h.record(&req, addr(1), &req.reply("ok"));
        assert_eq!(h.claim(&req, addr(1)), Claim::Done(req.reply("ok")));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn claimed_entries_count_towards_the_cap() {
        let h = InvocationHistory::new(1);
        let first = Envelope::new(Operation::Read, 1, "");
        let second = Envelope::new(Operation::Read, 2, "");

        assert_eq!(h.claim(&first, addr(1)), Claim::Fresh);
        assert_eq!(h.claim(&second, addr(1)), Claim::Fresh);
        assert_eq!(h.len(), 1);
        assert!(h.lookup(1, addr(1)).is_none());
    }

    #[test]
    fn capped_history_evicts_oldest_first() {
        let h = InvocationHistory::new(2);
        for id in 1..=3 {
            let req = Envelope::new(Operation::Read, id, "");
            h.begin(&req, addr(1));
            h.record(&req, addr(1), &req.reply(""));
        }
        assert_eq!(h.len(), 2);
        assert!(h.lookup(1, addr(1)).is_none());
        assert!(h.lookup(2, addr(1)).is_some());
        assert!(h.lookup(3, addr(1)).is_some());
    }
}
