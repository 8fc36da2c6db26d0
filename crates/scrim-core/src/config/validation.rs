//! Config validation - warns about unknown fields

use std::collections::{HashMap, HashSet};
use toml::Value;
use tracing::warn;

/// Validate TOML config and warn about unknown fields.
pub fn warn_unknown_fields(content: &str, config_name: &str) {
    let Ok(value) = content.parse::<Value>() else {
        return;
    };

    let expected = expected_config_keys();
    let unknowns = find_unknown_keys(&value, &expected, "");

    for path in unknowns {
        warn!("Unknown config field in {config_name}: {path}");
    }
}

/// Find unknown keys in a TOML value compared to expected keys.
/// Returns paths like `scripts[2].colur` for unknown fields.
fn find_unknown_keys(value: &Value, expected: &ExpectedKeys, prefix: &str) -> Vec<String> {
    let mut unknowns = Vec::new();

    match value {
        Value::Table(table) => {
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };

                if let Some(nested) = expected.nested.get(key.as_str()) {
                    unknowns.extend(find_unknown_keys(child, nested, &path));
                } else if !expected.fields.contains(key.as_str()) {
                    unknowns.push(path);
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                unknowns.extend(find_unknown_keys(item, expected, &format!("{prefix}[{i}]")));
            }
        }
        _ => {}
    }

    unknowns
}

/// Expected keys for a config section.
/// `fields` are leaf fields, `nested` are nested tables (or arrays of
/// tables) with their own expected keys.
struct ExpectedKeys {
    fields: HashSet<&'static str>,
    nested: HashMap<&'static str, ExpectedKeys>,
}

impl ExpectedKeys {
    fn new(fields: &[&'static str]) -> Self {
        Self {
            fields: fields.iter().copied().collect(),
            nested: HashMap::new(),
        }
    }

    fn with_nested(mut self, key: &'static str, nested: ExpectedKeys) -> Self {
        self.nested.insert(key, nested);
        self
    }
}

/// Expected keys for the scrim Config (settings.rs)
fn expected_config_keys() -> ExpectedKeys {
    let script_keys = ExpectedKeys::new(&[
        "name",
        "path",
        "triggers",
        "colour",
        "stay_open",
        "columns",
        "preview",
        "chain_respects_debounce",
    ]);

    ExpectedKeys::new(&[]).with_nested("scripts", script_keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config_no_warnings() {
        let content = r#"
            [[scripts]]
            name = "files"
            path = "/usr/local/bin/files.sh"
            triggers = ["on-start", "interval 30s"]
            colour = 4
            stay_open = true
            columns = [1, 2]
        "#;

        let value: Value = content.parse().unwrap();
        let expected = expected_config_keys();
        let unknowns = find_unknown_keys(&value, &expected, "");

        assert!(
            unknowns.is_empty(),
            "Expected no unknowns, got: {unknowns:?}"
        );
    }

    #[test]
    fn test_unknown_top_level_field() {
        let content = "unknown_section = 1\n";

        let value: Value = content.parse().unwrap();
        let expected = expected_config_keys();
        let unknowns = find_unknown_keys(&value, &expected, "");

        assert_eq!(unknowns, vec!["unknown_section"]);
    }

    #[test]
    fn test_unknown_script_field_reports_index() {
        let content = r#"
            [[scripts]]
            name = "a"
            path = "/bin/a"

            [[scripts]]
            name = "b"
            path = "/bin/b"
            colur = 3
        "#;

        let value: Value = content.parse().unwrap();
        let expected = expected_config_keys();
        let unknowns = find_unknown_keys(&value, &expected, "");

        assert_eq!(unknowns, vec!["scripts[1].colur"]);
    }

    #[test]
    fn test_warn_unknown_fields_does_not_panic_on_invalid_toml() {
        warn_unknown_fields("not [ valid toml", "test");
    }

    #[test]
    fn test_empty_config_no_warnings() {
        let value: Value = "".parse().unwrap();
        let expected = expected_config_keys();
        let unknowns = find_unknown_keys(&value, &expected, "");
        assert!(unknowns.is_empty());
    }
}
