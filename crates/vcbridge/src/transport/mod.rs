//! Transport security for vcbridge
//!
//! Three independent layers each keep their own certificate-validation
//! setting:
//!
//! - [`HttpClient`] (reqwest) for backend API calls
//! - [`TlsConnector`] (rustls) for raw TLS connections
//! - [`HttpsAgent`], the global default for ad-hoc HTTPS connections
//!
//! Components should be handed a [`TransportSecurityPolicy`] explicitly.
//! The process-wide defaults exist for code that is not, and are switched
//! to insecure mode by [`bootstrap_insecure_transport`].

mod agent;
mod bootstrap;
mod http;
mod layer;
mod policy;
mod tls;

pub use agent::{HttpsAgent, HttpsAgentLayer};
pub use bootstrap::{Bootstrapper, bootstrap_insecure_transport};
pub use http::{
    DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT_SECS, GenericHttpLayer, HttpClient,
    MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS, Method, Response,
};
pub use layer::{LayerKind, PatchResult, TransportLayer};
pub use policy::{
    TransportSecurityPolicy, ensure_crypto_provider, install_process_policy, process_policy,
};
pub use tls::{
    ConnectArgs, NativeTlsLayer, TlsConnectOptions, TlsConnector, TlsStream, apply_policy,
    client_config, normalize_connect_args,
};
