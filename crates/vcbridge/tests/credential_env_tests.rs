//! Credential Environment Mapper tests
//!
//! Covers the mapping contract end to end: stored record in, four
//! environment variables out.

use pretty_assertions::assert_eq;
use std::io::Write;
use vcbridge::{
    CliInvocation, ConnectionCredential, Error, INSECURE_VAR, PASSWORD_VAR, URL_VAR,
    USERNAME_VAR, map_credential,
};

#[test]
fn maps_domain_account_without_scheme() {
    let cred = ConnectionCredential::new("vc.example.com", "dom\\\\svc", "p@ss");
    let env = map_credential(&cred).unwrap();

    assert_eq!(
        env.vars(),
        [
            (URL_VAR, "https://vc.example.com"),
            (USERNAME_VAR, "dom\\svc"),
            (PASSWORD_VAR, "p@ss"),
            (INSECURE_VAR, "1"),
        ]
    );
}

#[test]
fn leaves_qualified_url_and_plain_user_alone() {
    let cred = ConnectionCredential::new("https://vc.example.com", "plainuser", "p");
    let env = map_credential(&cred).unwrap();

    assert_eq!(env.url, "https://vc.example.com");
    assert_eq!(env.username, "plainuser");
    assert_eq!(env.password.expose(), "p");
}

#[test]
fn http_scheme_is_kept() {
    let cred = ConnectionCredential::new("http://10.1.1.1", "u", "p");
    assert_eq!(map_credential(&cred).unwrap().url, "http://10.1.1.1");
}

#[test]
fn no_path_suffix_is_appended() {
    let cred = ConnectionCredential::new("vc.example.com", "u", "p");
    let env = map_credential(&cred).unwrap();
    assert!(!env.url.ends_with("/sdk"));
}

#[test]
fn empty_server_is_missing_field() {
    let cred = ConnectionCredential::new("", "a", "b");
    let err = map_credential(&cred).unwrap_err();
    assert!(matches!(err, Error::MissingField { field: "server" }));
    assert!(err.to_string().contains("server"));
}

#[test]
fn server_checked_before_user() {
    let err = map_credential(&ConnectionCredential::default()).unwrap_err();
    assert!(matches!(err, Error::MissingField { field: "server" }));
}

#[test]
fn mapping_is_stateless() {
    let cred = ConnectionCredential::new("vc", "dom\\\\svc", "p");
    assert_eq!(map_credential(&cred).unwrap(), map_credential(&cred).unwrap());
}

#[test]
fn loads_workspace_record_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"vsphere_server":"vc.lab.local","vsphere_user":"LAB\\\\ops","vsphere_password":"s3cret"}}"#
    )
    .unwrap();

    let cred = ConnectionCredential::from_path(file.path()).unwrap();
    let env = map_credential(&cred).unwrap();

    assert_eq!(env.url, "https://vc.lab.local");
    assert_eq!(env.username, "LAB\\ops");
    assert_eq!(env.password.expose(), "s3cret");
}

#[test]
fn record_without_server_fails_at_mapping() {
    let cred = ConnectionCredential::from_json(r#"{"user":"a","password":"b"}"#).unwrap();
    assert!(matches!(
        map_credential(&cred),
        Err(Error::MissingField { field: "server" })
    ));
}

#[test]
fn missing_file_is_io_error() {
    let err = ConnectionCredential::from_path("/nonexistent/vcbridge/creds.json").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn invocation_env_matches_mapping() {
    let env = map_credential(&ConnectionCredential::new("vc", "u", "p")).unwrap();
    let cmd = CliInvocation::with_program("govc", env.clone())
        .arg("about")
        .command();

    let envs: Vec<_> = cmd
        .as_std()
        .get_envs()
        .map(|(k, v)| {
            (
                k.to_string_lossy().into_owned(),
                v.map(|v| v.to_string_lossy().into_owned()),
            )
        })
        .collect();

    for (key, value) in env.vars() {
        assert!(envs.contains(&(key.to_string(), Some(value.to_string()))));
    }
}
