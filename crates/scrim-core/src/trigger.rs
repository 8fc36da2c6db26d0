//! Trigger declarations and the table built from them at startup.

use crate::config::Config;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Debounce delay for `input` triggers that do not declare one.
pub const DEFAULT_INPUT_DEBOUNCE: Duration = Duration::from_millis(300);

/// A parsed trigger declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerKind {
    /// Load once when the session starts.
    OnStart,
    /// Activate the script when the first query token equals the prefix.
    Prefix(String),
    /// Pull in the named script whenever this one is active or re-fires.
    Chain(String),
    /// Reload when the last successful load is older than the interval.
    Interval(Duration),
    /// Run on query changes, debounced by the delay.
    Input(Duration),
}

impl TriggerKind {
    /// Parse a `"<kind> <value>"` declaration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unknown kind, a missing value, or
    /// a malformed duration.
    pub fn parse(raw: &str) -> Result<Self> {
        let (kind, value) = match raw.split_once(' ') {
            Some((kind, value)) => (kind, value.trim()),
            None => (raw, ""),
        };

        match kind {
            "on-start" => Ok(Self::OnStart),
            "pre" => {
                if value.is_empty() {
                    return Err(Error::Config(format!("trigger {raw:?}: missing prefix")));
                }
                Ok(Self::Prefix(value.to_string()))
            }
            "script" => {
                if value.is_empty() {
                    return Err(Error::Config(format!(
                        "trigger {raw:?}: missing script name"
                    )));
                }
                Ok(Self::Chain(value.to_string()))
            }
            "interval" => Ok(Self::Interval(parse_duration(value)?)),
            "input" => {
                if value.is_empty() {
                    Ok(Self::Input(DEFAULT_INPUT_DEBOUNCE))
                } else {
                    Ok(Self::Input(parse_duration(value)?))
                }
            }
            _ => Err(Error::Config(format!("unknown trigger kind {kind:?}"))),
        }
    }
}

/// All trigger declarations, indexed for per-frame lookups.
/// Built once from configuration; list values preserve declaration order.
#[derive(Debug, Default)]
pub struct TriggerTable {
    on_start: Vec<String>,
    prefixes: HashMap<String, Vec<String>>,
    chains: HashMap<String, Vec<String>>,
    intervals: HashMap<String, Duration>,
    inputs: HashMap<String, Duration>,
}

impl TriggerTable {
    /// Parse every script's trigger list into one table.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unparsable declaration or a chain
    /// target that names no configured script.
    pub fn from_config(conf: &Config) -> Result<Self> {
        let names: HashSet<&str> = conf.scripts.iter().map(|s| s.name.as_str()).collect();

        let mut table = Self::default();
        for sconf in &conf.scripts {
            for raw in &sconf.triggers {
                let kind = TriggerKind::parse(raw).map_err(|e| match e {
                    Error::Config(msg) => {
                        Error::Config(format!("script {:?}: {msg}", sconf.name))
                    }
                    other => other,
                })?;

                match kind {
                    TriggerKind::OnStart => table.on_start.push(sconf.name.clone()),
                    TriggerKind::Prefix(prefix) => table
                        .prefixes
                        .entry(prefix)
                        .or_default()
                        .push(sconf.name.clone()),
                    TriggerKind::Chain(target) => {
                        if !names.contains(target.as_str()) {
                            return Err(Error::Config(format!(
                                "script {:?}: chain target {target:?} is not a configured script",
                                sconf.name
                            )));
                        }
                        table
                            .chains
                            .entry(sconf.name.clone())
                            .or_default()
                            .push(target);
                    }
                    TriggerKind::Interval(interval) => {
                        table.intervals.insert(sconf.name.clone(), interval);
                    }
                    TriggerKind::Input(delay) => {
                        table.inputs.insert(sconf.name.clone(), delay);
                    }
                }
            }
        }
        Ok(table)
    }

    /// Scripts loaded at session start, in configuration order.
    #[must_use]
    pub fn on_start(&self) -> &[String] {
        &self.on_start
    }

    /// Scripts activated by a prefix token, in declaration order.
    #[must_use]
    pub fn prefix_scripts(&self, prefix: &str) -> Option<&[String]> {
        self.prefixes.get(prefix).map(Vec::as_slice)
    }

    /// Scripts pulled in when the named script is active or re-fires.
    #[must_use]
    pub fn chained(&self, script: &str) -> &[String] {
        self.chains.get(script).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn interval(&self, script: &str) -> Option<Duration> {
        self.intervals.get(script).copied()
    }

    #[must_use]
    pub fn input_delay(&self, script: &str) -> Option<Duration> {
        self.inputs.get(script).copied()
    }

    /// Whether the script only runs through the debounce scheduler.
    #[must_use]
    pub fn is_input(&self, script: &str) -> bool {
        self.inputs.contains_key(script)
    }
}

/// Parse durations like `"250ms"`, `"10s"`, `"1m30s"` or `"2h"`.
fn parse_duration(raw: &str) -> Result<Duration> {
    let bytes = raw.as_bytes();
    if bytes.is_empty() {
        return Err(Error::Config("empty duration".to_string()));
    }

    let mut total = Duration::ZERO;
    let mut i = 0;
    while i < bytes.len() {
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let value: u64 = raw[digits_start..i]
            .parse()
            .map_err(|_| Error::Config(format!("invalid duration {raw:?}")))?;

        let unit_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_digit() {
            i += 1;
        }
        total += match &raw[unit_start..i] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            unit => {
                return Err(Error::Config(format!(
                    "invalid unit {unit:?} in duration {raw:?}"
                )));
            }
        };
    }

    Ok(total)
}

#[cfg(test)]
mod duration_tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_duration_compound() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(
            parse_duration("1s500ms").unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("ten seconds").is_err());
    }
}
