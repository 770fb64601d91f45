//! Insecure-Transport Bootstrapper
//!
//! Switches every transport layer of the process to
//! [`TransportSecurityPolicy::Insecure`] at startup.
//!
//! # Security
//!
//! This is an irreversible, process-wide change. After it runs, every
//! connection made through the process policy, the shared [`HttpClient`],
//! the shared [`TlsConnector`] or the global [`HttpsAgent`] accepts any
//! server certificate. There is no teardown. Each switched layer is
//! reported with a `WARN` event.
//!
//! Run it once, before anything opens a connection.
//! [`bootstrap_insecure_transport`] guards against repeated runs.
//!
//! [`HttpClient`]: super::HttpClient
//! [`TlsConnector`]: super::TlsConnector
//! [`HttpsAgent`]: super::HttpsAgent

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Once;

use super::agent::HttpsAgentLayer;
use super::http::GenericHttpLayer;
use super::layer::{LayerKind, PatchResult, TransportLayer};
use super::policy::{TransportSecurityPolicy, install_process_policy};
use super::tls::NativeTlsLayer;

/// Applies the insecure policy to the three transport layers.
///
/// Layers default to the real adapters; tests swap in their own.
pub struct Bootstrapper {
    generic_http: Box<dyn TransportLayer>,
    https_agent: Box<dyn TransportLayer>,
    native_tls: Box<dyn TransportLayer>,
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self {
            generic_http: Box::new(GenericHttpLayer),
            https_agent: Box::new(HttpsAgentLayer::default()),
            native_tls: Box::new(NativeTlsLayer),
        }
    }
}

impl Bootstrapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generic_http(mut self, layer: impl TransportLayer + 'static) -> Self {
        self.generic_http = Box::new(layer);
        self
    }

    pub fn https_agent(mut self, layer: impl TransportLayer + 'static) -> Self {
        self.https_agent = Box::new(layer);
        self
    }

    pub fn native_tls(mut self, layer: impl TransportLayer + 'static) -> Self {
        self.native_tls = Box::new(layer);
        self
    }

    /// Install the insecure process policy, then attempt each layer.
    ///
    /// Always returns three results, in [`LayerKind::ALL`] order. A failed
    /// or panicking layer is recorded and does not stop the others.
    pub fn run(&self) -> Vec<PatchResult> {
        let policy = TransportSecurityPolicy::Insecure;

        let effective = install_process_policy(policy);
        if effective != policy {
            tracing::warn!(
                installed = effective.as_str(),
                "process policy was already set; patching layers anyway"
            );
        }
        tracing::warn!("disabling TLS certificate verification for this process");

        let slots: [(LayerKind, &dyn TransportLayer); 3] = [
            (LayerKind::GenericHttpClient, self.generic_http.as_ref()),
            (LayerKind::NativeHttpsAgent, self.https_agent.as_ref()),
            (LayerKind::NativeTls, self.native_tls.as_ref()),
        ];

        let results: Vec<PatchResult> = slots
            .into_iter()
            .map(|(kind, layer)| attempt(kind, layer, policy))
            .collect();

        let applied = results.iter().filter(|r| r.applied).count();
        tracing::info!(applied, total = results.len(), "transport bootstrap finished");
        results
    }
}

fn attempt(
    kind: LayerKind,
    layer: &dyn TransportLayer,
    policy: TransportSecurityPolicy,
) -> PatchResult {
    if layer.kind() != kind {
        let result = PatchResult::failed(kind, format!("adapter is for {}", layer.kind()));
        tracing::warn!(layer = %kind, "patch attempt failed: adapter mismatch");
        return result;
    }

    let outcome = catch_unwind(AssertUnwindSafe(|| layer.apply(policy)));
    let result = match outcome {
        Ok(Ok(())) => PatchResult::applied(kind),
        Ok(Err(e)) => PatchResult::failed(kind, e.to_string()),
        Err(payload) => {
            PatchResult::failed(kind, format!("panicked: {}", panic_message(&*payload)))
        }
    };

    match &result.failure_reason {
        None => tracing::warn!(layer = %kind, "certificate verification disabled"),
        Some(reason) => tracing::warn!(layer = %kind, reason = %reason, "patch attempt failed"),
    }
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

static BOOTSTRAP: Once = Once::new();

/// Run the default [`Bootstrapper`] once per process.
///
/// The first call returns the results for the caller to report; later calls
/// touch no layer and return `None`. Results are not kept.
pub fn bootstrap_insecure_transport() -> Option<Vec<PatchResult>> {
    let mut results = None;
    BOOTSTRAP.call_once(|| results = Some(Bootstrapper::default().run()));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};

    struct Failing(LayerKind);

    impl TransportLayer for Failing {
        fn kind(&self) -> LayerKind {
            self.0
        }

        fn apply(&self, _policy: TransportSecurityPolicy) -> Result<()> {
            Err(Error::Transport("library not present".to_string()))
        }
    }

    struct Succeeding(LayerKind);

    impl TransportLayer for Succeeding {
        fn kind(&self) -> LayerKind {
            self.0
        }

        fn apply(&self, _policy: TransportSecurityPolicy) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn adapter_mismatch_is_reported() {
        let results = Bootstrapper::new()
            .generic_http(Succeeding(LayerKind::NativeTls))
            .https_agent(Succeeding(LayerKind::NativeHttpsAgent))
            .native_tls(Succeeding(LayerKind::NativeTls))
            .run();
        assert!(!results[0].applied);
        let reason = results[0].failure_reason.as_deref().unwrap_or_default();
        assert!(reason.contains("native-tls"));
        assert!(results[1].applied);
        assert!(results[2].applied);
    }

    #[test]
    fn all_layers_failing_still_returns_three() {
        let results = Bootstrapper::new()
            .generic_http(Failing(LayerKind::GenericHttpClient))
            .https_agent(Failing(LayerKind::NativeHttpsAgent))
            .native_tls(Failing(LayerKind::NativeTls))
            .run();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.applied));
        for result in &results {
            assert_eq!(
                result.failure_reason.as_deref(),
                Some("transport error: library not present")
            );
        }
    }

    #[test]
    fn panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
