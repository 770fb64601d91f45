//! Fault injection tests for the transport bootstrapper
//!
//! Fail points are global state; run single-threaded:
//!
//! ```sh
//! cargo test --features failpoints --test security_failpoint_tests -- --test-threads=1
//! ```

#![cfg(feature = "failpoints")]

use vcbridge::transport::{Bootstrapper, LayerKind};

#[test]
fn failpoint_generic_http_fails_only_that_layer() {
    fail::cfg("transport::generic_http", "return").unwrap();
    let results = Bootstrapper::new().run();
    fail::cfg("transport::generic_http", "off").unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].layer, LayerKind::GenericHttpClient);
    assert!(!results[0].applied);
    assert!(
        results[0]
            .failure_reason
            .as_deref()
            .is_some_and(|r| r.contains("unavailable"))
    );
    assert!(results[1].applied);
    assert!(results[2].applied);
}

#[test]
fn failpoint_native_tls_fails_only_that_layer() {
    fail::cfg("transport::native_tls", "return").unwrap();
    let results = Bootstrapper::new().run();
    fail::cfg("transport::native_tls", "off").unwrap();

    assert!(results[0].applied);
    assert!(results[1].applied);
    assert!(!results[2].applied);
}

#[test]
fn failpoint_every_layer() {
    for name in [
        "transport::generic_http",
        "transport::https_agent",
        "transport::native_tls",
    ] {
        fail::cfg(name, "return").unwrap();
    }
    let results = Bootstrapper::new().run();
    for name in [
        "transport::generic_http",
        "transport::https_agent",
        "transport::native_tls",
    ] {
        fail::cfg(name, "off").unwrap();
    }

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| !r.applied));
}

#[test]
fn failpoint_panic_is_contained() {
    fail::cfg("transport::https_agent", "panic(agent shape changed)").unwrap();
    let results = Bootstrapper::new().run();
    fail::cfg("transport::https_agent", "off").unwrap();

    assert!(!results[1].applied);
    assert!(
        results[1]
            .failure_reason
            .as_deref()
            .is_some_and(|r| r.contains("agent shape changed"))
    );
}
