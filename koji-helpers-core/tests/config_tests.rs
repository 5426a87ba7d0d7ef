//! Config file loading: error messages, full documents, validation.

use assert_fs::prelude::*;
use koji_helpers_core::config::{self, ComposeMethod, Seconds};
use koji_helpers_core::ConfigError;
use predicates::prelude::predicate;
use predicates::Predicate;

const FULL: &str = r#"
state_dir: /srv/state
tools:
  koji: /opt/koji/bin/koji
smashd:
  check_interval: 15
  quiescent_period: 90
  min_interval: 5
  max_interval: 600
  exclude_tags: [trashcan, scratch]
  compose: mash
  repo_dir: /srv/repos
  notifications:
    from: koji@example.com
    to: [builders@example.com]
repositories:
  f38-candidates:
    gpg_key_id: 1A2B3C4D
    sigul_key_name: f38
    sigul_key_pass: secret
    mash_path: f38/candidates
gojira:
  min_interval: 60
  max_interval: 1800
  retry:
    attempts: 5
    rest: 2.5
buildroots:
  f38-build:
    arches: [x86_64]
    dependencies: ["https://mirror.example.com/f38/$basearch/"]
"#;

#[test]
fn load_full_document() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(FULL).expect("write");

    let config = config::load_at(file.path()).expect("load");
    let smashd = config.smashd().expect("smashd");
    assert_eq!(smashd.compose, ComposeMethod::Mash);
    assert_eq!(smashd.exclude_tags, vec!["trashcan", "scratch"]);
    assert_eq!(config.gojira.retry.attempts, 5);
    assert_eq!(config.gojira.retry.rest, Seconds(2.5));
    assert_eq!(
        config.buildroots["f38-build"].dependency_urls(),
        vec!["https://mirror.example.com/f38/x86_64/repodata/repomd.xml"]
    );
    // untouched tool paths keep their defaults
    assert_eq!(config.tools.rsync, std::path::PathBuf::from("/usr/bin/rsync"));
}

#[test]
fn load_missing_file_returns_not_found() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = config::load_at(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    assert!(predicate::str::contains("absent.yaml").eval(&err.to_string()));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("smashd: [unclosed").expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("smashd:\n  quiesent_period: 30\n").expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn notifications_need_recipients() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("smashd:\n  notifications:\n    from: a@b\n    to: []\n")
        .expect("write");

    let err = config::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
}
