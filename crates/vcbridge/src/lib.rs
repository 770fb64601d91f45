//! vcbridge - bridge stored vSphere credentials to command-line tooling
//!
//! Two independent pieces:
//!
//! - [`map_credential`] turns a [`ConnectionCredential`] into the
//!   environment the `govc` CLI reads, and [`CliInvocation`] runs the tool
//!   with it.
//! - [`bootstrap_insecure_transport`] switches every transport layer of the
//!   process to skip certificate validation.
//!
//! # Example
//!
//! ```rust
//! use vcbridge::{ConnectionCredential, map_credential};
//!
//! let cred = ConnectionCredential::new("vc.example.com", "dom\\\\svc", "p@ss");
//! let env = map_credential(&cred)?;
//! assert_eq!(env.url, "https://vc.example.com");
//! assert_eq!(env.username, "dom\\svc");
//! assert_eq!(env.insecure, "1");
//! # Ok::<(), vcbridge::Error>(())
//! ```
//!
//! # Security
//!
//! Both pieces deliberately produce insecure configurations. See
//! [`transport`] for the process-wide effects of bootstrapping.

mod cli_env;
mod credential;
mod error;
mod invocation;
pub mod logging;
pub mod transport;

pub use cli_env::{
    CliEnvironment, INSECURE_SENTINEL, INSECURE_VAR, PASSWORD_VAR, URL_VAR, USERNAME_VAR,
    map_credential, normalize_server, normalize_username,
};
pub use credential::{ConnectionCredential, Secret};
pub use error::{Error, Result};
pub use invocation::{CliInvocation, CommandOutput, DEFAULT_PROGRAM, PROGRAM_ENV, default_program};
pub use transport::{
    Bootstrapper, HttpClient, HttpsAgent, LayerKind, PatchResult, TlsConnector,
    TransportSecurityPolicy, bootstrap_insecure_transport,
};
