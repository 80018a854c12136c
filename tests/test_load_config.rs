use std::fs::write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

/// A full static config produces the repository and group catalogues.
#[test]
fn test_load_config_reads_repos_groups_and_patterns() {
    let config_yaml = r#"
gitlab_url: https://gitlab.example.com
repos:
  - id: backend
    name: Backend
    gitlab_path: "https://gitlab.example.com/acme/backend"
  - id: frontend
    gitlab_path: "acme/frontend"
groups:
  - id: platform
    repos: [backend, frontend]
test_patterns:
  - test
  - spec
history_file: ./history.jsonl
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = mr_ledger::load_config::load_config(config_file.path())
        .expect("Config should load");

    assert_eq!(config.gitlab_url, "https://gitlab.example.com");
    assert_eq!(config.repos.len(), 2);
    assert_eq!(config.repos[0].id, "backend");
    assert_eq!(config.repos[1].name, "");
    assert_eq!(config.groups[0].repos, vec!["backend", "frontend"]);
    assert_eq!(config.test_patterns, vec!["test", "spec"]);
    assert_eq!(config.history_file, Some(PathBuf::from("./history.jsonl")));

    // Missing display names fall back to the id when materialised.
    assert_eq!(config.repos[1].to_repository().name, "frontend");
}

/// Omitted sections default rather than erroring.
#[test]
fn test_load_config_defaults_optional_sections() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"repos: []\n").unwrap();

    let config = mr_ledger::load_config::load_config(config_file.path())
        .expect("Config should load");
    assert_eq!(config.gitlab_url, "https://gitlab.com");
    assert!(config.repos.is_empty());
    assert!(config.groups.is_empty());
    assert!(config.test_patterns.is_empty());
    assert!(config.history_file.is_none());
}

/// Invalid YAML is reported as a parse failure.
#[test]
fn test_load_config_errors_for_invalid_file() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"not-yaml: [:::").unwrap();

    let err = mr_ledger::load_config::load_config(config_file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}
