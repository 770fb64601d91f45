//! Credential Environment Mapper
//!
//! Turns a [`ConnectionCredential`] into the environment variables the
//! `govc` command-line tool reads:
//!
//! | Key             | Value                                              |
//! |-----------------|----------------------------------------------------|
//! | `GOVC_URL`      | server, prefixed with `https://` if it has no scheme |
//! | `GOVC_USERNAME` | user, with a doubled backslash collapsed once      |
//! | `GOVC_PASSWORD` | password, unmodified                               |
//! | `GOVC_INSECURE` | always `1`                                         |
//!
//! # Security
//!
//! The produced environment always skips certificate verification. Deciding
//! whether that is acceptable for a given endpoint is the caller's job.

use std::fmt;

use crate::credential::{ConnectionCredential, Secret};
use crate::error::{Error, Result};
use crate::logging::LogConfig;

pub const URL_VAR: &str = "GOVC_URL";
pub const USERNAME_VAR: &str = "GOVC_USERNAME";
pub const PASSWORD_VAR: &str = "GOVC_PASSWORD";
pub const INSECURE_VAR: &str = "GOVC_INSECURE";

/// Value of [`INSECURE_VAR`]: skip certificate validation.
pub const INSECURE_SENTINEL: &str = "1";

const DOUBLED_SEPARATOR: &str = "\\\\";
const SEPARATOR: &str = "\\";

/// Environment mapping for the external CLI tool.
///
/// Derived statelessly from a credential on every call; holds no identity.
#[derive(Clone, PartialEq, Eq)]
pub struct CliEnvironment {
    /// Fully qualified URL with scheme
    pub url: String,
    /// De-escaped username
    pub username: String,
    pub password: Secret,
    /// Always [`INSECURE_SENTINEL`]
    pub insecure: &'static str,
}

impl CliEnvironment {
    /// The four `(key, value)` pairs, in fixed order.
    pub fn vars(&self) -> [(&'static str, &str); 4] {
        [
            (URL_VAR, self.url.as_str()),
            (USERNAME_VAR, self.username.as_str()),
            (PASSWORD_VAR, self.password.expose()),
            (INSECURE_VAR, self.insecure),
        ]
    }

    /// The pairs with secret-named values redacted per `config`.
    pub fn redacted_vars(&self, config: &LogConfig) -> Vec<(&'static str, String)> {
        self.vars()
            .into_iter()
            .map(|(key, value)| {
                let value = if key == URL_VAR {
                    config.redact_url(value)
                } else {
                    config.redact_env_value(key, value)
                };
                (key, value.into_owned())
            })
            .collect()
    }
}

impl fmt::Debug for CliEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliEnvironment")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password)
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl fmt::Display for CliEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.redacted_vars(&LogConfig::default()) {
            writeln!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Map a stored credential to the CLI tool's environment.
///
/// Fails with [`Error::MissingField`] when `server` or `user` is empty.
/// The password is passed through as-is, including when empty.
pub fn map_credential(credential: &ConnectionCredential) -> Result<CliEnvironment> {
    if credential.server.is_empty() {
        return Err(Error::missing("server"));
    }
    if credential.user.is_empty() {
        return Err(Error::missing("user"));
    }

    let env = CliEnvironment {
        url: normalize_server(&credential.server),
        username: normalize_username(&credential.user),
        password: credential.password.clone(),
        insecure: INSECURE_SENTINEL,
    };

    tracing::debug!(
        url = %LogConfig::default().redact_url(&env.url),
        username = %crate::logging::sanitize_for_log(&env.username),
        "mapped credential to CLI environment"
    );

    Ok(env)
}

/// Prefix `https://` unless the server already starts with `http://` or
/// `https://`. No path is appended.
pub fn normalize_server(server: &str) -> String {
    if server.starts_with("http://") || server.starts_with("https://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    }
}

/// Collapse the first doubled backslash to a single one.
///
/// Stored usernames like `DOMAIN\\user` were escaped twice on their way
/// through JSON. Only the first doubled pair is collapsed, in one pass.
pub fn normalize_username(user: &str) -> String {
    user.replacen(DOUBLED_SEPARATOR, SEPARATOR, 1)
}
