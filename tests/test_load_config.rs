use note_publisher::load_config::{load_config, DEFAULT_API_URL};
use note_publisher_core::config::ImageLayout;
use serial_test::serial;
use std::fs::write;
use tempfile::{tempdir, NamedTempFile};

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
#[serial]
fn minimal_config_gets_defaults() {
    let vault = tempdir().unwrap();
    let file = config_file(&format!(
        "vault_dir: {}\nremote:\n  owner: alice\n  repo: garden\n",
        vault.path().display()
    ));

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.vault_dir, vault.path());
    assert_eq!(config.remote.api_url, DEFAULT_API_URL);
    assert_eq!(config.remote.coordinates().branch, None);
    assert_eq!(config.publish.publish_root, "notes");
    assert_eq!(config.state_path(), vault.path().join(".note-publisher.json"));
}

#[test]
#[serial]
fn publish_section_and_branch_are_read() {
    let vault = tempdir().unwrap();
    let file = config_file(&format!(
        r#"
vault_dir: {}
state_file: /tmp/published.json
remote:
  owner: alice
  repo: garden
  branch: gh-pages
  api_url: https://ghe.example.com/api/v3
publish:
  publish_root: "/"
  exclude: [Private, Drafts]
  slugify: true
  image_layout: flat
"#,
        vault.path().display()
    ));

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.remote.coordinates().branch.as_deref(), Some("gh-pages"));
    assert_eq!(config.remote.api_url, "https://ghe.example.com/api/v3");
    assert_eq!(config.publish.publish_root, "/");
    assert_eq!(config.publish.exclude, vec!["Private", "Drafts"]);
    assert!(config.publish.slugify);
    assert_eq!(config.publish.image_layout, ImageLayout::Flat);
    assert_eq!(config.state_path(), std::path::PathBuf::from("/tmp/published.json"));
}

#[test]
#[serial]
fn empty_owner_is_a_config_error() {
    let vault = tempdir().unwrap();
    let file = config_file(&format!(
        "vault_dir: {}\nremote:\n  owner: \"\"\n  repo: garden\n",
        vault.path().display()
    ));

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("remote.owner"), "got: {err}");
}

#[test]
#[serial]
fn missing_vault_dir_is_rejected() {
    let file = config_file("vault_dir: /definitely/not/here\nremote:\n  owner: a\n  repo: b\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("not a directory"), "got: {err}");
}

#[test]
#[serial]
fn invalid_yaml_reports_parse_error() {
    let file = config_file("not-yaml: [:::");
    let msg = load_config(file.path()).unwrap_err().to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}
