//! Stored connection credentials.
//!
//! A [`ConnectionCredential`] is the server/user/password tuple used to
//! authenticate against an infrastructure management endpoint. Records are
//! sourced externally (usually a workspace configuration file); this module
//! only defines their shape and decoding.
//!
//! # Security
//!
//! The password is held in a [`Secret`] that is wiped on drop and never
//! printed by `Debug`.

use std::fmt;
use std::path::Path;

use serde::Deserialize;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Opaque secret string, zeroed on drop.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret. Use only where the raw value is required.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(*** {} bytes ***)", self.0.len())
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Server address, username and password for an endpoint.
///
/// Absent fields decode as empty strings; the mapper rejects an empty
/// `server` or `user` with [`Error::MissingField`].
///
/// Accepts both the short field names and the `vsphere_*` names used by
/// stored workspace variables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionCredential {
    /// Hostname or URL, possibly without a scheme.
    #[serde(default, alias = "vsphere_server")]
    pub server: String,
    /// Account name, possibly domain-qualified with a doubled backslash.
    #[serde(default, alias = "vsphere_user")]
    pub user: String,
    #[serde(default, alias = "vsphere_password")]
    pub password: Secret,
}

impl ConnectionCredential {
    pub fn new(
        server: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<Secret>,
    ) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// Decode a credential record from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        // serde_json error text can echo input fragments, so report only the position.
        serde_json::from_str(json).map_err(|e| {
            Error::InvalidCredential(format!(
                "{:?} error at line {}, column {}",
                e.classify(),
                e.line(),
                e.column()
            ))
        })
    }

    /// Read and decode a credential record from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn decodes_short_field_names() {
        let cred = ConnectionCredential::from_json(
            r#"{"server":"vc.example.com","user":"admin","password":"pw"}"#,
        )
        .unwrap();
        assert_eq!(cred.server, "vc.example.com");
        assert_eq!(cred.user, "admin");
        assert_eq!(cred.password.expose(), "pw");
    }

    #[test]
    fn decodes_workspace_field_names() {
        let cred = ConnectionCredential::from_json(
            r#"{"vsphere_server":"vc","vsphere_user":"dom\\\\svc","vsphere_password":"p"}"#,
        )
        .unwrap();
        assert_eq!(cred.server, "vc");
        // JSON escapes decode to two literal backslashes
        assert_eq!(cred.user, "dom\\\\svc");
    }

    #[test]
    fn absent_fields_decode_empty() {
        let cred = ConnectionCredential::from_json(r#"{"user":"a"}"#).unwrap();
        assert!(cred.server.is_empty());
        assert!(cred.password.is_empty());
    }

    #[test]
    fn malformed_json_does_not_echo_input() {
        let err = ConnectionCredential::from_json("{\"password\": \"hunter2\", ").unwrap_err();
        assert!(matches!(err, Error::InvalidCredential(_)));
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn secret_debug_no_leak() {
        let secret = Secret::new("secret123");
        let debug_output = format!("{:?}", secret);
        assert!(!debug_output.contains("secret123"));
        assert!(debug_output.contains("9 bytes"));

        let cred = ConnectionCredential::new("vc", "u", "secret123");
        assert!(!format!("{:?}", cred).contains("secret123"));
    }
}
