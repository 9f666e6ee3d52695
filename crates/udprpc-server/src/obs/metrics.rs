//! Minimal metrics registry for the RPC server.
//!
//! Counter and histogram types with dynamic labels backed by `DashMap`.
//! Labels are flattened into sorted key vectors to keep deterministic
//! ordering. Histogram buckets are fixed in microseconds.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 when never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let labels = label_str(r.key());
            if labels.is_empty() {
                let _ = writeln!(out, "{} {}", name, val);
            } else {
                let _ = writeln!(out, "{}{{{}}} {}", name, labels, val);
            }
        }
    }
}

// 100us, 500us, 1ms, 5ms, 10ms, 50ms, 100ms, 500ms, 1s
const BUCKETS_MICROS: [u64; 9] = [
    100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000,
];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 9],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration and increment cumulative buckets (microsecond scale).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);
        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for r in self.map.iter() {
            let hist = r.value();
            let labels = label_str(r.key());
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{},", labels)
            };

            for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = hist.sum.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

#[derive(Default)]
pub struct RpcMetrics {
    pub requests: CounterVec,
    pub replays: CounterVec,
    pub decode_errors: CounterVec,
    pub handler_errors: CounterVec,
    pub notifications: CounterVec,
    pub simulated_drops: CounterVec,
    pub dispatch_duration: HistogramVec, // microseconds
}

impl RpcMetrics {
    /// Render every registered metric in Prometheus text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.requests.render("udprpc_requests_total", &mut out);
        self.replays.render("udprpc_replays_total", &mut out);
        self.decode_errors.render("udprpc_decode_errors_total", &mut out);
        self.handler_errors.render("udprpc_handler_errors_total", &mut out);
        self.notifications.render("udprpc_notifications_total", &mut out);
        self.simulated_drops.render("udprpc_simulated_drops_total", &mut out);
        self.dispatch_duration
            .render("udprpc_dispatch_duration_micros", &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_order_does_not_split_series() {
        let c = CounterVec::default();
        c.inc(&[("op", "READ"), ("mode", "x")]);
        c.inc(&[("mode", "x"), ("op", "READ")]);
        assert_eq!(c.get(&[("op", "READ"), ("mode", "x")]), 2);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let h = HistogramVec::default();
        h.observe(&[("op", "READ")], Duration::from_micros(700));
        let mut out = String::new();
        h.render("d", &mut out);
        assert!(out.contains("d_bucket{op=\"READ\",le=\"500\"} 0"));
        assert!(out.contains("d_bucket{op=\"READ\",le=\"1000\"} 1"));
        assert!(out.contains("d_bucket{op=\"READ\",le=\"+Inf\"} 1"));
        assert_eq!(h.count(&[("op", "READ")]), 1);
    }

    #[test]
    fn unlabelled_counter_renders_bare_name() {
        let m = RpcMetrics::default();
        m.simulated_drops.inc(&[]);
        assert!(m.render().contains("udprpc_simulated_drops_total 1\n"));
    }
}
