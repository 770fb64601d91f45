//! Native TLS connector.
//!
//! A blocking rustls connector whose certificate validation follows a
//! [`TransportSecurityPolicy`]. Connect arguments come in two shapes,
//! mirroring the usual `connect(options)` and `connect(port, host, options)`
//! conventions; [`normalize_connect_args`] folds both into one
//! [`TlsConnectOptions`] before the policy is applied.
//!
//! # Security
//!
//! Under [`TransportSecurityPolicy::Insecure`] the server certificate chain
//! and host name are not checked. Handshake signatures are still verified
//! against the presented certificate.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme,
    StreamOwned,
};

use super::layer::{LayerKind, TransportLayer};
use super::policy::{TransportSecurityPolicy, crypto_provider, process_policy};
use crate::error::{Error, Result};

#[cfg(feature = "failpoints")]
use fail::fail_point;

/// Port used when neither argument shape names one.
pub const DEFAULT_PORT: u16 = 443;

/// Host used when neither argument shape names one.
pub const DEFAULT_HOST: &str = "localhost";

/// Default TCP connect timeout (10 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-read and per-write timeout while handshaking (10 seconds)
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// A rustls client stream over TCP.
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// Canonical connect options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConnectOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// SNI and verification name; defaults to `host`
    pub servername: Option<String>,
    /// `Some(false)` skips certificate validation; `None` means validate
    pub reject_unauthorized: Option<bool>,
    pub alpn_protocols: Vec<String>,
}

impl TlsConnectOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.servername = Some(name.into());
        self
    }

    pub fn reject_unauthorized(mut self, reject: bool) -> Self {
        self.reject_unauthorized = Some(reject);
        self
    }

    pub fn alpn(mut self, protocol: impl Into<String>) -> Self {
        self.alpn_protocols.push(protocol.into());
        self
    }

    pub fn resolved_host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn resolved_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn server_name(&self) -> &str {
        self.servername
            .as_deref()
            .unwrap_or_else(|| self.resolved_host())
    }

    /// Whether the server certificate will be validated.
    pub fn verifies_certificates(&self) -> bool {
        self.reject_unauthorized.unwrap_or(true)
    }
}

/// The two accepted connect argument shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectArgs {
    /// Everything in one options value.
    Options(TlsConnectOptions),
    /// Port and host given positionally, options optional.
    Positional {
        port: u16,
        host: Option<String>,
        options: Option<TlsConnectOptions>,
    },
}

impl From<TlsConnectOptions> for ConnectArgs {
    fn from(options: TlsConnectOptions) -> Self {
        ConnectArgs::Options(options)
    }
}

impl From<(&str, u16)> for ConnectArgs {
    fn from((host, port): (&str, u16)) -> Self {
        ConnectArgs::Positional {
            port,
            host: Some(host.to_string()),
            options: None,
        }
    }
}

/// Fold either argument shape into canonical options.
///
/// Positional `port` and `host` take precedence over the same fields in
/// the trailing options.
pub fn normalize_connect_args(args: ConnectArgs) -> TlsConnectOptions {
    match args {
        ConnectArgs::Options(options) => options,
        ConnectArgs::Positional {
            port,
            host,
            options,
        } => {
            let mut options = options.unwrap_or_default();
            options.port = Some(port);
            if host.is_some() {
                options.host = host;
            }
            options
        }
    }
}

/// Inject the policy's verification setting into `options`.
///
/// An insecure policy forces `reject_unauthorized = false`. A verifying
/// policy leaves an explicit per-call choice in place.
pub fn apply_policy(
    mut options: TlsConnectOptions,
    policy: TransportSecurityPolicy,
) -> TlsConnectOptions {
    if policy.accepts_invalid_certs() {
        options.reject_unauthorized = Some(false);
    }
    options
}

/// Build a rustls client config.
pub fn client_config(verify: bool, alpn_protocols: &[String]) -> Result<Arc<ClientConfig>> {
    let provider = crypto_provider();
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?;

    let mut config = if verify {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertificateVerification::new(provider)))
            .with_no_client_auth()
    };

    config.alpn_protocols = alpn_protocols
        .iter()
        .map(|p| p.as_bytes().to_vec())
        .collect();

    Ok(Arc::new(config))
}

/// Accepts any server certificate. Signatures are still checked.
#[derive(Debug)]
struct NoCertificateVerification {
    provider: Arc<CryptoProvider>,
}

impl NoCertificateVerification {
    fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Blocking TLS connector bound to a policy.
#[derive(Debug, Clone)]
pub struct TlsConnector {
    policy: TransportSecurityPolicy,
    connect_timeout: Duration,
    handshake_timeout: Duration,
}

static SHARED_CONNECTOR: OnceLock<TlsConnector> = OnceLock::new();

impl TlsConnector {
    pub fn new(policy: TransportSecurityPolicy) -> Self {
        Self {
            policy,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound each socket read and write during the handshake.
    ///
    /// A zero duration is treated as one millisecond.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// The connector installed by the bootstrapper, or one following the
    /// process policy if none was installed.
    pub fn shared() -> TlsConnector {
        SHARED_CONNECTOR
            .get()
            .cloned()
            .unwrap_or_else(|| TlsConnector::new(process_policy()))
    }

    pub fn policy(&self) -> TransportSecurityPolicy {
        self.policy
    }

    /// Canonical options for `args` with the policy applied.
    pub fn resolve(&self, args: impl Into<ConnectArgs>) -> TlsConnectOptions {
        apply_policy(normalize_connect_args(args.into()), self.policy)
    }

    /// Build the client session for `args` without opening a socket.
    pub fn prepare(
        &self,
        args: impl Into<ConnectArgs>,
    ) -> Result<(TlsConnectOptions, ClientConnection)> {
        let options = self.resolve(args);
        let config = client_config(options.verifies_certificates(), &options.alpn_protocols)?;
        let server_name = ServerName::try_from(options.server_name().to_string())
            .map_err(|e| Error::Tls(format!("invalid server name: {}", e)))?;
        let conn = ClientConnection::new(config, server_name)?;
        Ok((options, conn))
    }

    /// Dial and complete the TLS handshake.
    ///
    /// The returned stream has no read or write timeout set.
    pub fn connect(&self, args: impl Into<ConnectArgs>) -> Result<TlsStream> {
        let (options, conn) = self.prepare(args)?;
        if !options.verifies_certificates() {
            tracing::debug!(
                host = options.resolved_host(),
                port = options.resolved_port(),
                "TLS connect without certificate validation"
            );
        }

        let tcp = self.dial(options.resolved_host(), options.resolved_port())?;
        tcp.set_read_timeout(Some(self.handshake_timeout))?;
        tcp.set_write_timeout(Some(self.handshake_timeout))?;

        let mut stream = StreamOwned::new(conn, tcp);
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .map_err(|e| self.handshake_error(e))?;
        }

        stream.sock.set_read_timeout(None)?;
        stream.sock.set_write_timeout(None)?;
        Ok(stream)
    }

    fn handshake_error(&self, e: io::Error) -> Error {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Tls(format!(
                "handshake timed out after {}ms",
                self.handshake_timeout.as_millis()
            )),
            _ => Error::Tls(format!("handshake failed: {}", e)),
        }
    }

    fn dial(&self, host: &str, port: u16) -> Result<TcpStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => Error::Io(e),
            None => Error::Network(format!("no addresses for {}:{}", host, port)),
        })
    }
}

/// Native TLS layer: installs the shared [`TlsConnector`].
#[derive(Debug, Default)]
pub struct NativeTlsLayer;

impl TransportLayer for NativeTlsLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::NativeTls
    }

    fn apply(&self, policy: TransportSecurityPolicy) -> Result<()> {
        #[cfg(feature = "failpoints")]
        fail_point!("transport::native_tls", |_| Err(Error::Transport(
            "native TLS connector unavailable".to_string()
        )));

        // Fails here if no usable protocol versions or provider exist
        client_config(policy.reject_unauthorized(), &[])?;

        let installed = SHARED_CONNECTOR.get_or_init(|| TlsConnector::new(policy));
        if installed.policy != policy {
            return Err(Error::Transport(format!(
                "connector already initialized with {} policy",
                installed.policy.as_str()
            )));
        }
        Ok(())
    }
}
