//! vcbridge CLI - run govc with stored credentials and probe the backend
//!
//! Usage:
//!   vcbridge env --credentials creds.json          # Print the mapped environment
//!   vcbridge exec --credentials creds.json -- ls   # Run govc with it
//!   vcbridge bootstrap                             # Switch transports to insecure mode
//!   vcbridge get https://backend/api/workspaces    # GET a backend URL
//!   vcbridge probe vc.example.com                  # TLS handshake check

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vcbridge::logging::LogConfig;
use vcbridge::transport::{
    HttpClient, HttpsAgent, Method, PatchResult, bootstrap_insecure_transport,
};
use vcbridge::{CliEnvironment, CliInvocation, ConnectionCredential, map_credential};

/// vcbridge - credential bridge for govc and the infrastructure backend
#[derive(Parser, Debug)]
#[command(name = "vcbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Disable TLS certificate verification for every connection this process makes
    #[arg(long, global = true, env = "VCBRIDGE_INSECURE")]
    insecure: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the govc environment for a stored credential
    Env {
        /// Credential record (JSON)
        #[arg(long, env = "VCBRIDGE_CREDENTIALS")]
        credentials: PathBuf,

        /// Print the password instead of redacting it
        #[arg(long)]
        show_secrets: bool,
    },
    /// Run govc with the environment for a stored credential
    Exec {
        /// Credential record (JSON)
        #[arg(long, env = "VCBRIDGE_CREDENTIALS")]
        credentials: PathBuf,

        /// govc binary
        #[arg(long, env = "VCBRIDGE_GOVC")]
        govc: Option<String>,

        /// Arguments passed to govc
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Disable certificate verification on every transport layer and report
    Bootstrap,
    /// GET a backend URL and print the response
    Get {
        url: String,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Open a TLS connection and report the negotiated parameters
    Probe {
        host: String,

        #[arg(long, default_value_t = 443)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let early = if args.insecure {
        bootstrap_insecure_transport()
    } else {
        None
    };
    if let Some(results) = &early {
        report(results);
    }

    match args.command {
        Cmd::Env {
            credentials,
            show_secrets,
        } => {
            let env = load_env(&credentials)?;
            let config = if show_secrets {
                LogConfig::new().unsafe_disable_redaction()
            } else {
                LogConfig::new()
            };
            for (key, value) in env.redacted_vars(&config) {
                println!("{}={}", key, value);
            }
        }
        Cmd::Exec {
            credentials,
            govc,
            args,
        } => {
            let env = load_env(&credentials)?;
            let invocation = match govc {
                Some(program) => CliInvocation::with_program(program, env),
                None => CliInvocation::new(env),
            }
            .args(args);

            let status = invocation
                .command()
                .status()
                .await
                .with_context(|| format!("Failed to run {}", invocation.program()))?;
            std::process::exit(status.code().unwrap_or(1));
        }
        Cmd::Bootstrap => {
            let results = match early {
                Some(results) => results,
                None => {
                    let results = bootstrap_insecure_transport().unwrap_or_default();
                    report(&results);
                    results
                }
            };
            if results.iter().all(|r| !r.applied) {
                eprintln!("vcbridge: no transport layer could be switched to insecure mode");
                std::process::exit(1);
            }
        }
        Cmd::Get { url, timeout } => {
            let client = HttpClient::shared().context("Failed to create HTTP client")?;
            let response = client
                .request_with_timeouts(Method::Get, &url, None, &[], timeout, None)
                .await
                .with_context(|| format!("GET {} failed", LogConfig::new().redact_url(&url)))?;
            println!("HTTP {}", response.status);
            println!("{}", response.body_string());
            if !response.is_success() {
                std::process::exit(1);
            }
        }
        Cmd::Probe { host, port } => {
            let connector = HttpsAgent::global().connector();
            let target = host.clone();
            let stream = tokio::task::spawn_blocking(move || {
                connector.connect((target.as_str(), port))
            })
            .await
            .context("TLS probe task failed")?
            .with_context(|| format!("TLS connection to {}:{} failed", host, port))?;

            let conn = &stream.conn;
            println!("host: {}:{}", host, port);
            println!("protocol: {:?}", conn.protocol_version());
            let suite = conn.negotiated_cipher_suite().map(|s| s.suite());
            println!("cipher suite: {:?}", suite);
            let peer_certs = conn.peer_certificates().map_or(0, |c| c.len());
            println!("peer certificates: {}", peer_certs);
            println!("verified: {}", HttpsAgent::global().reject_unauthorized());
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_env(path: &Path) -> Result<CliEnvironment> {
    let credential = ConnectionCredential::from_path(path)
        .with_context(|| format!("Failed to read credentials: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded credential record");
    map_credential(&credential).context("Invalid credential record")
}

fn report(results: &[PatchResult]) {
    for result in results {
        eprintln!("transport {}", result);
    }
}
