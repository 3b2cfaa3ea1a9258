#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use syncroom_gateway::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
gateway:
  listen: "0.0.0.0:8080"
  ping_intervall_ms: 1000 # typo should fail
auth:
  tickets:
    - { ticket: "t", user_id: "u", display_name: "alice" }
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
auth:
  tickets:
    - { ticket: "t", user_id: "u", display_name: "alice" }
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.gateway.outbound_capacity, 256);
    assert_eq!(cfg.gateway.max_frame_bytes, 65536);
    assert!(cfg.gateway.ping_interval_ms < cfg.gateway.pong_timeout_ms);
    assert!(cfg.hub.announce_evictions);
    assert_eq!(cfg.auth.tickets[0].display_name, "alice");
}

#[test]
fn ping_must_be_shorter_than_pong_timeout() {
    let bad = r#"
version: 1
gateway:
  ping_interval_ms: 60000
  pong_timeout_ms: 60000
auth:
  tickets:
    - { ticket: "t", user_id: "u", display_name: "alice" }
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("pong_timeout_ms"));
}

#[test]
fn wrong_version_rejected() {
    let bad = r#"
version: 2
auth:
  tickets:
    - { ticket: "t", user_id: "u", display_name: "alice" }
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn tickets_required() {
    let bad = r#"
version: 1
auth:
  tickets: []
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn zero_outbound_capacity_rejected() {
    let bad = r#"
version: 1
gateway:
  outbound_capacity: 0
auth:
  tickets:
    - { ticket: "t", user_id: "u", display_name: "alice" }
"#;
    assert!(config::load_from_str(bad).is_err());
}
