//! Transport security policy.
//!
//! A [`TransportSecurityPolicy`] is decided once at startup and passed to
//! every component that opens a connection. The process-wide cell holds the
//! policy chosen by the bootstrapper for code that was not handed one.

use std::sync::{Arc, OnceLock};

use rustls::crypto::CryptoProvider;

/// Whether TLS peers must present a certificate chain we trust.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportSecurityPolicy {
    /// Validate certificate chains and host names (default).
    #[default]
    Verify,
    /// Accept any certificate, including self-signed and expired ones.
    ///
    /// # Warning
    ///
    /// Connections are open to interception. Use only against endpoints
    /// reached over a network you control.
    Insecure,
}

impl TransportSecurityPolicy {
    pub fn accepts_invalid_certs(self) -> bool {
        matches!(self, Self::Insecure)
    }

    /// Value of the `reject_unauthorized` connect option under this policy.
    pub fn reject_unauthorized(self) -> bool {
        !self.accepts_invalid_certs()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Insecure => "insecure",
        }
    }
}

static PROCESS_POLICY: OnceLock<TransportSecurityPolicy> = OnceLock::new();

/// Install the process-wide policy.
///
/// The first call wins. Returns the policy in effect afterwards, which
/// differs from `policy` if another one was installed earlier.
pub fn install_process_policy(policy: TransportSecurityPolicy) -> TransportSecurityPolicy {
    ensure_crypto_provider();
    *PROCESS_POLICY.get_or_init(|| policy)
}

/// The process-wide policy, [`TransportSecurityPolicy::Verify`] until one is installed.
pub fn process_policy() -> TransportSecurityPolicy {
    PROCESS_POLICY.get().copied().unwrap_or_default()
}

/// Install `ring` as the process default rustls crypto provider.
///
/// reqwest is built with `rustls-no-provider`, so a provider must be in place
/// before any client is built. Safe to call repeatedly.
pub fn ensure_crypto_provider() {
    // Err means a provider is already installed, which is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// The crypto provider used for configs built by this crate.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider()))
}
