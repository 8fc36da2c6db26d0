//! Tests for config parsing

use crate::config::{Config, ScriptConfig};
use std::path::PathBuf;

#[test]
fn test_parse_minimal_script() {
    let toml = r#"
        [[scripts]]
        name = "files"
        path = "/usr/local/bin/files.sh"
    "#;
    let conf: Config = toml::from_str(toml).unwrap();

    assert_eq!(conf.scripts.len(), 1);
    let script = &conf.scripts[0];
    assert_eq!(script.name, "files");
    assert_eq!(script.path, PathBuf::from("/usr/local/bin/files.sh"));
    assert!(script.triggers.is_empty());
    assert_eq!(script.colour, 0);
    assert!(!script.stay_open);
    assert!(script.columns.is_empty());
    assert!(script.preview.is_none());
    assert!(!script.chain_respects_debounce);
}

#[test]
fn test_parse_full_script() {
    let toml = r#"
        [[scripts]]
        name = "windows"
        path = "~/bin/windows.sh"
        triggers = ["on-start", "interval 10s", "pre w"]
        colour = 5
        stay_open = true
        columns = [2, 3]
        preview = 15
        chain_respects_debounce = true
    "#;
    let conf: Config = toml::from_str(toml).unwrap();

    let script = &conf.scripts[0];
    assert_eq!(
        script.triggers,
        ["on-start", "interval 10s", "pre w"]
    );
    assert_eq!(script.colour, 5);
    assert!(script.stay_open);
    assert_eq!(script.columns, [2, 3]);
    assert_eq!(script.preview, Some(15));
    assert!(script.chain_respects_debounce);
}

#[test]
fn test_parse_preserves_script_order() {
    let toml = r#"
        [[scripts]]
        name = "b"
        path = "/bin/b"

        [[scripts]]
        name = "a"
        path = "/bin/a"
    "#;
    let conf: Config = toml::from_str(toml).unwrap();

    let names: Vec<&str> = conf.scripts.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["b", "a"]);
}

#[test]
fn test_empty_config_is_valid() {
    let conf: Config = toml::from_str("").unwrap();
    assert!(conf.scripts.is_empty());
}

#[test]
fn test_missing_required_field_is_error() {
    let toml = r#"
        [[scripts]]
        name = "nameless"
    "#;
    assert!(toml::from_str::<Config>(toml).is_err());
}

#[test]
fn test_load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[[scripts]]\nname = \"x\"\npath = \"/bin/x\"\n",
    )
    .unwrap();

    let conf = Config::load(&path).unwrap();
    assert_eq!(conf.scripts[0].name, "x");
}

#[test]
fn test_load_missing_file_is_error() {
    let err = Config::load(std::path::Path::new("/nonexistent/scrim.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/scrim.toml"));
}

#[test]
fn test_load_invalid_toml_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "scripts = not valid").unwrap();

    assert!(Config::load(&path).is_err());
}

#[test]
fn test_resolved_path_passthrough() {
    let script = ScriptConfig {
        name: "x".to_string(),
        path: PathBuf::from("/opt/scripts/x.sh"),
        triggers: Vec::new(),
        colour: 0,
        stay_open: false,
        columns: Vec::new(),
        preview: None,
        chain_respects_debounce: false,
    };
    assert_eq!(script.resolved_path(), PathBuf::from("/opt/scripts/x.sh"));
}

#[test]
fn test_resolved_path_expands_tilde() {
    let script = ScriptConfig {
        name: "x".to_string(),
        path: PathBuf::from("~/bin/x.sh"),
        triggers: Vec::new(),
        colour: 0,
        stay_open: false,
        columns: Vec::new(),
        preview: None,
        chain_respects_debounce: false,
    };

    if let Some(home) = std::env::var_os("HOME") {
        assert_eq!(
            script.resolved_path(),
            PathBuf::from(home).join("bin/x.sh")
        );
    }
}
