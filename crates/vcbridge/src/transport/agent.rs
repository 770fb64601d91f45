//! Global HTTPS agent.
//!
//! The agent holds the default verification option for ad-hoc HTTPS
//! connections made without an explicit connector. It starts out
//! verifying; the bootstrapper flips its option in place.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustls::ClientConfig;

use super::layer::{LayerKind, TransportLayer};
use super::policy::TransportSecurityPolicy;
use super::tls::{TlsConnector, client_config};
use crate::error::Result;

#[cfg(feature = "failpoints")]
use fail::fail_point;

#[derive(Debug)]
pub struct HttpsAgent {
    reject_unauthorized: AtomicBool,
}

static GLOBAL_AGENT: HttpsAgent = HttpsAgent::new();

impl HttpsAgent {
    pub const fn new() -> Self {
        Self {
            reject_unauthorized: AtomicBool::new(true),
        }
    }

    /// The process-wide default agent.
    pub fn global() -> &'static HttpsAgent {
        &GLOBAL_AGENT
    }

    pub fn reject_unauthorized(&self) -> bool {
        self.reject_unauthorized.load(Ordering::Acquire)
    }

    pub fn set_reject_unauthorized(&self, reject: bool) {
        self.reject_unauthorized.store(reject, Ordering::Release);
    }

    pub fn policy(&self) -> TransportSecurityPolicy {
        if self.reject_unauthorized() {
            TransportSecurityPolicy::Verify
        } else {
            TransportSecurityPolicy::Insecure
        }
    }

    pub fn client_config(&self) -> Result<Arc<ClientConfig>> {
        client_config(self.reject_unauthorized(), &[])
    }

    /// A connector following this agent's current option.
    pub fn connector(&self) -> TlsConnector {
        TlsConnector::new(self.policy())
    }
}

impl Default for HttpsAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTPS agent layer: sets the agent's verification option directly.
#[derive(Debug)]
pub struct HttpsAgentLayer {
    agent: &'static HttpsAgent,
}

impl HttpsAgentLayer {
    pub fn new(agent: &'static HttpsAgent) -> Self {
        Self { agent }
    }
}

impl Default for HttpsAgentLayer {
    fn default() -> Self {
        Self::new(HttpsAgent::global())
    }
}

impl TransportLayer for HttpsAgentLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::NativeHttpsAgent
    }

    fn apply(&self, policy: TransportSecurityPolicy) -> Result<()> {
        #[cfg(feature = "failpoints")]
        fail_point!("transport::https_agent", |_| Err(crate::Error::Transport(
            "https agent unavailable".to_string()
        )));

        self.agent.set_reject_unauthorized(policy.reject_unauthorized());
        Ok(())
    }
}
