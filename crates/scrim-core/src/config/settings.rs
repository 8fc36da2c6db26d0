use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration: the ordered list of scripts.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scripts: Vec<ScriptConfig>,
}

/// One configured script.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    /// Unique name, also the first column in the list view.
    pub name: String,

    /// Executable path. A leading `~` expands to the home directory.
    pub path: PathBuf,

    /// Trigger declarations of the form `"<kind> <value>"`.
    #[serde(default)]
    pub triggers: Vec<String>,

    /// Indexed terminal colour for the accent bar.
    #[serde(default)]
    pub colour: u8,

    /// Keep the session open after running an item of this script.
    #[serde(default)]
    pub stay_open: bool,

    /// 1-indexed tab-separated columns to display. Empty shows all.
    #[serde(default)]
    pub columns: Vec<usize>,

    /// Cap on rendered lines for this script. `None` shows all matches.
    #[serde(default)]
    pub preview: Option<usize>,

    /// Route chain re-fires of this script through its debounce window
    /// instead of reloading immediately. Only meaningful with an
    /// `input` trigger.
    #[serde(default)]
    pub chain_respects_debounce: bool,
}

impl Config {
    /// Load and parse the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;

        super::validation::warn_unknown_fields(&content, &path.display().to_string());

        let conf: Self = toml::from_str(&content)?;
        Ok(conf)
    }
}

impl ScriptConfig {
    /// Executable path with a leading `~/` expanded to the home directory.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(rest) = self.path.to_str().and_then(|p| p.strip_prefix("~/"))
            && let Some(home) = std::env::var_os("HOME")
        {
            return PathBuf::from(home).join(rest);
        }
        self.path.clone()
    }
}
