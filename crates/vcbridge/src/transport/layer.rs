//! Transport layer adapters and patch results.

use std::fmt;

use super::policy::TransportSecurityPolicy;
use crate::error::Result;

/// The independent network-stack abstractions that each keep their own
/// certificate-validation setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// reqwest-based [`HttpClient`](super::HttpClient)
    GenericHttpClient,
    /// rustls-based [`TlsConnector`](super::TlsConnector)
    NativeTls,
    /// Global [`HttpsAgent`](super::HttpsAgent)
    NativeHttpsAgent,
}

impl LayerKind {
    /// All layers in bootstrap order.
    pub const ALL: [LayerKind; 3] = [
        LayerKind::GenericHttpClient,
        LayerKind::NativeHttpsAgent,
        LayerKind::NativeTls,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::GenericHttpClient => "generic-http-client",
            LayerKind::NativeTls => "native-tls",
            LayerKind::NativeHttpsAgent => "native-https-agent",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying a policy to one layer.
///
/// Produced once per layer at startup and only used for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    pub layer: LayerKind,
    pub applied: bool,
    pub failure_reason: Option<String>,
}

impl PatchResult {
    pub fn applied(layer: LayerKind) -> Self {
        Self {
            layer,
            applied: true,
            failure_reason: None,
        }
    }

    pub fn failed(layer: LayerKind, reason: impl Into<String>) -> Self {
        Self {
            layer,
            applied: false,
            failure_reason: Some(reason.into()),
        }
    }
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure_reason {
            None => write!(f, "{}: applied", self.layer),
            Some(reason) => write!(f, "{}: not applied ({})", self.layer, reason),
        }
    }
}

/// A network layer whose certificate validation can be configured.
///
/// Implementations configure the layer's process-wide default so that
/// later users of that layer observe `policy`. Reapplying the same policy
/// must be harmless.
pub trait TransportLayer: Send + Sync {
    fn kind(&self) -> LayerKind;

    fn apply(&self, policy: TransportSecurityPolicy) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        assert_eq!(
            PatchResult::applied(LayerKind::NativeTls).to_string(),
            "native-tls: applied"
        );
        assert_eq!(
            PatchResult::failed(LayerKind::GenericHttpClient, "library absent").to_string(),
            "generic-http-client: not applied (library absent)"
        );
    }

    #[test]
    fn all_layers_are_distinct() {
        let kinds: std::collections::HashSet<_> = LayerKind::ALL.into_iter().collect();
        assert_eq!(kinds.len(), 3);
    }
}
