#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use httpscope_server::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
server:
  listen: "0.0.0.0:8080"
metrics:
  pth: "/metrics" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.class().as_str(), "CONFIGURATION");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.listen, "0.0.0.0:8080");
    assert_eq!(cfg.metrics.path, "/metrics");
    assert_eq!(cfg.metrics.slow_request_threshold_ms, 1000);
    assert_eq!(cfg.metrics.uptime_interval_ms, 1000);
    assert!(cfg.metrics.record_unmatched);
    assert_eq!(cfg.metrics.summary_window, 1024);
}

#[test]
fn full_config_round_trips_values() {
    let ok = r#"
version: 1
server:
  listen: "127.0.0.1:9100"
metrics:
  path: "/internal/metrics"
  slow_request_threshold_ms: 250
  uptime_interval_ms: 5000
  record_unmatched: false
  summary_window: 64
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.server.listen_addr().unwrap().port(), 9100);
    assert_eq!(cfg.metrics.path, "/internal/metrics");
    assert_eq!(cfg.metrics.slow_request_threshold().as_millis(), 250);
    assert_eq!(cfg.metrics.uptime_interval().as_secs(), 5);
    assert!(!cfg.metrics.record_unmatched);
    assert_eq!(cfg.metrics.summary_window, 64);
}

#[test]
fn rejects_out_of_range_values() {
    for bad in [
        "version: 2\n",
        "version: 1\nserver:\n  listen: \"not an addr\"\n",
        "version: 1\nmetrics:\n  path: \"metrics\"\n",
        "version: 1\nmetrics:\n  slow_request_threshold_ms: 0\n",
        "version: 1\nmetrics:\n  uptime_interval_ms: 10\n",
        "version: 1\nmetrics:\n  summary_window: 0\n",
    ] {
        let err = config::load_from_str(bad).expect_err(bad);
        assert_eq!(err.class().as_str(), "CONFIGURATION", "{bad}");
    }
}

#[test]
fn rejects_metrics_paths_the_router_cannot_serve() {
    for path in ["/get", "/post", "/slow", "/m/*rest/x", "/m/:id", "/{id}", "/a b", "/m?x=1"] {
        let yaml = format!("version: 1\nmetrics:\n  path: \"{path}\"\n");
        let err = config::load_from_str(&yaml).expect_err(path);
        assert_eq!(err.class().as_str(), "CONFIGURATION", "{path}");
    }
}

#[test]
fn accepted_metrics_path_builds_a_router() {
    let yaml = "version: 1\nmetrics:\n  path: \"/internal/v1.metrics\"\n";
    let cfg = config::load_from_str(yaml).expect("must parse");
    let state = httpscope_server::app_state::AppState::new(cfg).expect("state");
    let _router = httpscope_server::router::build_router(state);
}

#[test]
fn missing_file_is_reported() {
    let err = config::load_from_file("/nonexistent/httpscope.yaml").expect_err("must fail");
    assert!(err.to_string().contains("read config"));
}
