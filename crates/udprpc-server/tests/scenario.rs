#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use udprpc_core::error::Result;
use udprpc_core::{Envelope, Operation};
use udprpc_server::app_state::AppState;
use udprpc_server::config;
use udprpc_server::transport::DatagramSink;

const CONFIG: &str = r#"
version: 1
facilities:
  - name: F1
    open:
      - { day: MONDAY, start: "08:00", end: "17:00" }
"#;

#[derive(Default)]
struct Outbox(Mutex<Vec<(Envelope, SocketAddr)>>);

#[async_trait]
impl DatagramSink for Outbox {
    async fn send_to(&self, frame: &[u8], target: SocketAddr) -> Result<()> {
        let m = udprpc_core::protocol::wire_marshaller()?;
        let env = m.decode_value(frame)?;
        self.0.lock().unwrap().push((env, target));
        Ok(())
    }
}

struct Session {
    state: AppState,
    outbox: Outbox,
}

impl Session {
    fn new() -> Self {
        let cfg = config::load_from_str(CONFIG).unwrap();
        Self {
            state: AppState::new(cfg).unwrap(),
            outbox: Outbox::default(),
        }
    }

    async fn call(&self, from: SocketAddr, op: Operation, id: i32, payload: &str) -> Envelope {
        let dispatcher = self.state.dispatcher();
        let frame = dispatcher
            .marshaller()
            .encode_value(&Envelope::new(op, id, payload))
            .unwrap();
        let reply_frame = dispatcher
            .handle_datagram(&frame, from, &self.outbox)
            .await
            .unwrap();
        let reply: Envelope = dispatcher.marshaller().decode_value(&reply_frame).unwrap();
        assert_eq!(reply.request_id(), id);
        reply
    }
}

fn alice() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], 40000))
}

fn bob() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 2], 40000))
}

fn field<'a>(payload: &'a str, key: &str) -> &'a str {
    payload
        .lines()
        .find_map(|l| l.strip_prefix(key).and_then(|r| r.strip_prefix(':')))
        .unwrap_or_else(|| panic!("no {key} in {payload:?}"))
}

#[tokio::test]
async fn book_then_read_availability() {
    let s = Session::new();

    let names = s.call(alice(), Operation::Read, 1, "facility,ALL").await;
    assert_eq!(names.payload(), "status:SUCCESS\nfacilityNames:F1,");

    let booked = s.call(alice(), Operation::Write, 2, "F1,MONDAY,9,0,10,0").await;
    assert_eq!(field(booked.payload(), "status"), "SUCCESS");
    assert_eq!(field(booked.payload(), "startTime"), "0900");
    assert_eq!(field(booked.payload(), "endTime"), "1000");

    let avail = s.call(alice(), Operation::Read, 3, "facility,F1").await;
    assert!(
        avail.payload().contains("MONDAY:0800 - 0900,1000 - 1700,"),
        "{}",
        avail.payload()
    );
}

#[tokio::test]
async fn overlapping_booking_is_refused() {
    let s = Session::new();

    s.call(alice(), Operation::Write, 1, "F1,MONDAY,9,0,10,0").await;
    let clash = s.call(bob(), Operation::Write, 1, "F1,MONDAY,9,30,11,0").await;

    assert_eq!(
        clash.payload(),
        "status:ERROR\nmessage:Facility not available at the requested time"
    );
}

#[tokio::test]
async fn only_the_owner_may_cancel() {
    let s = Session::new();

    let booked = s.call(alice(), Operation::Write, 1, "F1,MONDAY,9,0,10,0").await;
    let id = field(booked.payload(), "bookingID").to_owned();

    let denied = s.call(bob(), Operation::Delete, 1, &format!("{id},F1")).await;
    assert_eq!(field(denied.payload(), "status"), "ERROR");

    let done = s.call(alice(), Operation::Delete, 2, &format!("{id},F1")).await;
    assert_eq!(field(done.payload(), "status"), "SUCCESS");

    let avail = s.call(alice(), Operation::Read, 3, "facility,F1,MONDAY").await;
    assert!(avail.payload().contains("MONDAY:0800 - 1700,"));
}

#[tokio::test]
async fn retransmitted_booking_is_not_applied_twice() {
    let s = Session::new();

    let first = s.call(alice(), Operation::Write, 5, "F1,MONDAY,9,0,10,0").await;
    let again = s.call(alice(), Operation::Write, 5, "F1,MONDAY,9,0,10,0").await;

    assert_eq!(first, again);
    assert_eq!(field(again.payload(), "status"), "SUCCESS");
}

#[tokio::test]
async fn monitor_receives_availability_after_booking() {
    let s = Session::new();

    let reg = s.call(bob(), Operation::Monitor, 77, "register,F1,60").await;
    assert_eq!(field(reg.payload(), "status"), "SUCCESS");

    s.call(alice(), Operation::Write, 1, "F1,MONDAY,12,0,13,0").await;

    let sent = std::mem::take(&mut *s.outbox.0.lock().unwrap());
    assert_eq!(sent.len(), 1);
    let (note, target) = &sent[0];
    assert_eq!(*target, bob());
    assert_eq!(note.operation(), Operation::Monitor);
    assert_eq!(note.request_id(), 77);
    assert!(note
        .payload()
        .contains("MONDAY:0800 - 1200,1300 - 1700,"));
}

#[tokio::test]
async fn unknown_facility_monitor_is_refused() {
    let s = Session::new();

    let reg = s.call(bob(), Operation::Monitor, 1, "register,Nope,60").await;

    assert_eq!(
        reg.payload(),
        "status:ERROR\nmessage:Invalid facilityName provided"
    );
    assert!(s.state.dispatcher().monitors().is_empty());
}
