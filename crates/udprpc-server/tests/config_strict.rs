#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use udprpc_server::config::{self, Semantics};
use udprpc_server::services::facility::Weekday;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
server:
  listen: "0.0.0.0:6789"
  semantix: at-least-once # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.status_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.listen, "0.0.0.0:6789");
    assert_eq!(cfg.server.max_datagram_bytes, 1024);
    assert_eq!(cfg.server.semantics, Semantics::AtMostOnce);
    assert_eq!(cfg.history.max_entries, 0);
    let names: Vec<_> = cfg.facilities.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["Weekday1", "Weekday2", "Weekends"]);
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
server:
  listen: "127.0.0.1:7000"
  max_datagram_bytes: 2048
  semantics: at-least-once
history:
  max_entries: 500
simulation:
  drop_rate: 0.4
  min_delay_ms: 100
  max_delay_ms: 300
facilities:
  - name: F1
    open:
      - { day: MONDAY, start: "08:00", end: "17:00" }
      - { day: FRIDAY, start: "10:30", end: "12:00" }
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.server.semantics, Semantics::AtLeastOnce);
    assert_eq!(cfg.server.listen_addr().unwrap().port(), 7000);
    assert_eq!(cfg.history.max_entries, 500);
    assert_eq!(cfg.simulation.max_delay_ms, 300);
    assert_eq!(cfg.facilities.len(), 1);
    assert_eq!(cfg.facilities[0].open[1].day, Weekday::Friday);
}

#[test]
fn out_of_range_values_fail_validation() {
    for bad in [
        "version: 2\n",
        "version: 1\nserver: { listen: \"not an addr\" }\n",
        "version: 1\nserver: { max_datagram_bytes: 70000 }\n",
        "version: 1\nsimulation: { drop_rate: 1.5 }\n",
        "version: 1\nsimulation: { min_delay_ms: 10, max_delay_ms: 5 }\n",
        "version: 1\nfacilities: [ { name: A }, { name: A } ]\n",
        "version: 1\nfacilities: [ { name: A, open: [ { day: MONDAY, start: \"17:00\", end: \"08:00\" } ] } ]\n",
        "version: 1\nfacilities: [ { name: A, open: [ { day: FUNDAY, start: \"08:00\", end: \"17:00\" } ] } ]\n",
        "version: 1\nfacilities: [ { name: A, open: [ { day: MONDAY, start: \"8am\", end: \"17:00\" } ] } ]\n",
    ] {
        let err = config::load_from_str(bad).expect_err(bad);
        assert_eq!(err.status_code().as_str(), "BAD_REQUEST", "{bad}");
    }
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let cfg = config::load_or_default("/definitely/not/here/udprpc.yaml").expect("defaults");
    assert_eq!(cfg.server.listen, "0.0.0.0:6789");
}
